//! Telemetry packets
//!
//! A packet is a plain `Copy` value: destination tag, the populated channel
//! range and one payload per channel slot, stored inline. It is built on the
//! audio thread's stack, copied through the queue and handed to the UI as a
//! fixed-size little-endian byte blob.
//!
//! ```text
//! | tag: u32 | channel_count: u16 | channel_offset: u16 | NC x payload (f32...) |
//! ```

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

/// Destination identifier, the UI control a packet is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-channel payload carried by a packet
///
/// Implementors are fixed-size runs of `f32`.
pub trait Payload: Copy + Send + 'static {
    /// Number of `f32` values in one payload
    const FLOATS: usize;

    /// All-zero payload
    const ZERO: Self;

    fn write(&self, buf: &mut BytesMut);

    fn read(buf: &mut &[u8]) -> Self;

    /// Apply `f` to every value in place
    fn apply(&mut self, f: impl FnMut(f32) -> f32);
}

impl Payload for f32 {
    const FLOATS: usize = 1;
    const ZERO: Self = 0.0;

    fn write(&self, buf: &mut BytesMut) {
        buf.put_f32_le(*self);
    }

    fn read(buf: &mut &[u8]) -> Self {
        buf.get_f32_le()
    }

    fn apply(&mut self, mut f: impl FnMut(f32) -> f32) {
        *self = f(*self);
    }
}

impl<const N: usize> Payload for [f32; N] {
    const FLOATS: usize = N;
    const ZERO: Self = [0.0; N];

    fn write(&self, buf: &mut BytesMut) {
        for v in self {
            buf.put_f32_le(*v);
        }
    }

    fn read(buf: &mut &[u8]) -> Self {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = buf.get_f32_le();
        }
        out
    }

    fn apply(&mut self, mut f: impl FnMut(f32) -> f32) {
        for v in self.iter_mut() {
            *v = f(*v);
        }
    }
}

/// Held peak and smoothed average of one channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Levels {
    pub peak: f32,
    pub average: f32,
}

impl Payload for Levels {
    const FLOATS: usize = 2;
    const ZERO: Self = Levels {
        peak: 0.0,
        average: 0.0,
    };

    fn write(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.peak);
        buf.put_f32_le(self.average);
    }

    fn read(buf: &mut &[u8]) -> Self {
        let peak = buf.get_f32_le();
        let average = buf.get_f32_le();
        Levels { peak, average }
    }

    fn apply(&mut self, mut f: impl FnMut(f32) -> f32) {
        self.peak = f(self.peak);
        self.average = f(self.average);
    }
}

const HEADER_LEN: usize = 8;

/// One unit of telemetry for `NC` channel slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet<T: Payload, const NC: usize> {
    pub tag: Tag,
    pub channel_count: usize,
    pub channel_offset: usize,
    pub values: [T; NC],
}

impl<T: Payload, const NC: usize> Packet<T, NC> {
    /// Size of the encoded byte blob
    pub const ENCODED_LEN: usize = HEADER_LEN + NC * T::FLOATS * 4;

    /// Empty packet addressing all `NC` channels
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            channel_count: NC,
            channel_offset: 0,
            values: [T::ZERO; NC],
        }
    }

    /// Populated channel slots
    pub fn channels(&self) -> &[T] {
        &self.values[self.channel_offset..self.channel_offset + self.channel_count]
    }

    /// Populated channel slots, mutable
    pub fn channels_mut(&mut self) -> &mut [T] {
        &mut self.values[self.channel_offset..self.channel_offset + self.channel_count]
    }

    /// Append the fixed-size encoding to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(Self::ENCODED_LEN);
        buf.put_u32_le(self.tag.0);
        buf.put_u16_le(self.channel_count as u16);
        buf.put_u16_le(self.channel_offset as u16);
        for v in &self.values {
            v.write(buf);
        }
    }

    /// Rebuild a packet from a blob produced by [`Packet::encode_into`]
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(DecodeError::Length {
                expected: Self::ENCODED_LEN,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let tag = Tag(buf.get_u32_le());
        let channel_count = buf.get_u16_le() as usize;
        let channel_offset = buf.get_u16_le() as usize;

        if channel_offset + channel_count > NC {
            return Err(DecodeError::ChannelRange {
                offset: channel_offset,
                count: channel_count,
                max: NC,
            });
        }

        let mut values = [T::ZERO; NC];
        for v in values.iter_mut() {
            *v = T::read(&mut buf);
        }

        Ok(Self {
            tag,
            channel_count,
            channel_offset,
            values,
        })
    }
}
