//! Raw sample run sender, for oscilloscope-style displays
//!
//! Samples are written straight into the outgoing packet. All channels share
//! one write position, so they complete their runs together.

use crate::constants::DEFAULT_THRESHOLD;
use crate::dsp::Sample;
use crate::error::ConfigError;
use crate::packet::{Packet, Tag};
use crate::sender::gate::Gate;
use crate::sender::{self, debug_check_channels, PacketSender, Passthrough, Prepare, Transmitter};

/// Buffer sender settings
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSettings {
    /// Samples per channel in each packet, at most the packet's array length
    pub buffer_size: usize,
    /// Summed `|x|` over one buffer below which it counts as silent
    pub threshold: f32,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            buffer_size: 512,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Producer half of the buffer sender
///
/// `N` is the per-channel capacity of a packet.
pub struct BufferSender<const NC: usize, const N: usize> {
    sender: PacketSender<[f32; N], NC>,
    gate: Gate,
    buffer_size: usize,
    packet: Packet<[f32; N], NC>,
    pos: usize,
    level: f32,
}

impl<const NC: usize, const N: usize> BufferSender<NC, N> {
    pub fn new(
        tag: Tag,
        capacity: usize,
        settings: BufferSettings,
    ) -> Result<(Self, Transmitter<[f32; N], NC>), ConfigError> {
        Self::with_prepare(tag, capacity, settings, Passthrough)
    }

    pub fn with_prepare<P: Prepare<[f32; N], NC>>(
        tag: Tag,
        capacity: usize,
        settings: BufferSettings,
        prepare: P,
    ) -> Result<(Self, Transmitter<[f32; N], NC, P>), ConfigError> {
        if settings.buffer_size == 0 || settings.buffer_size > N {
            return Err(ConfigError::BufferSize {
                size: settings.buffer_size,
                max: N,
            });
        }

        let (sender, transmitter) = sender::channel(tag, capacity, prepare)?;
        Ok((
            Self {
                sender,
                gate: Gate::new(settings.threshold),
                buffer_size: settings.buffer_size,
                packet: Packet::new(tag),
                pos: 0,
                level: 0.0,
            },
            transmitter,
        ))
    }

    /// Copy one audio block into the current run, pushing each completed run
    pub fn process_block<S: Sample>(
        &mut self,
        inputs: &[&[S]],
        n_frames: usize,
        channel_count: usize,
        channel_offset: usize,
    ) {
        debug_check_channels(inputs, n_frames, channel_count, channel_offset, NC);
        let channels = channel_offset..channel_offset + channel_count;

        for s in 0..n_frames {
            for ch in channels.clone() {
                let x = inputs[ch][s].to_f32();
                self.packet.values[ch][self.pos] = x;
                self.level += x.abs();
            }

            self.pos += 1;
            if self.pos == self.buffer_size {
                self.packet.channel_count = channel_count;
                self.packet.channel_offset = channel_offset;

                if self.gate.admit(self.level) {
                    self.sender.push_data(self.packet);
                }

                self.pos = 0;
                self.level = 0.0;
            }
        }
    }

    pub fn tag(&self) -> Tag {
        self.sender.tag()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Packets dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.sender.overflow_count()
    }
}
