//! Senders: audio-thread producers of UI telemetry
//!
//! Every sender is split in two halves sharing one lock-free queue:
//!
//! * a producer half living on the audio callback, which accumulates samples
//!   in place and pushes one [`Packet`] whenever a window completes;
//! * a [`Transmitter`] living on the UI thread, which drains the queue on
//!   each idle tick, runs a [`Prepare`] policy over every packet and hands the
//!   encoded bytes to a [`Dispatch`] implementation.
//!
//! The producer half never locks, allocates or logs.

pub mod buffer;
pub mod gate;
pub mod peak;
pub mod peak_avg;
pub mod spectrum;

pub use buffer::{BufferSender, BufferSettings};
pub use gate::Gate;
pub use peak::{PeakSender, PeakSettings};
pub use peak_avg::{AverageMode, PeakAvgSender, PeakAvgSettings};
pub use spectrum::{SpectrumOutput, SpectrumSender, SpectrumSettings};

use bytes::BytesMut;

use crate::dispatch::{Dispatch, MessageKind};
use crate::dsp::amp_to_db;
use crate::error::ConfigError;
use crate::packet::{Packet, Payload, Tag};
use crate::queue::{self, Consumer, Producer};

/// Per-packet transform run on the UI thread before dispatch
pub trait Prepare<T: Payload, const NC: usize> {
    fn prepare(&mut self, packet: &mut Packet<T, NC>);
}

/// Leaves packets untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<T: Payload, const NC: usize> Prepare<T, NC> for Passthrough {
    #[inline]
    fn prepare(&mut self, _packet: &mut Packet<T, NC>) {}
}

/// Converts every populated value from linear amplitude to dBFS
#[derive(Debug, Clone, Copy)]
pub struct ToDecibels {
    pub floor_db: f32,
}

impl Default for ToDecibels {
    fn default() -> Self {
        Self { floor_db: -120.0 }
    }
}

impl<T: Payload, const NC: usize> Prepare<T, NC> for ToDecibels {
    fn prepare(&mut self, packet: &mut Packet<T, NC>) {
        let floor = self.floor_db;
        for value in packet.channels_mut() {
            value.apply(|v| amp_to_db(v, floor));
        }
    }
}

impl<T, F, const NC: usize> Prepare<T, NC> for F
where
    T: Payload,
    F: FnMut(&mut Packet<T, NC>),
{
    fn prepare(&mut self, packet: &mut Packet<T, NC>) {
        self(packet)
    }
}

/// Create the two halves of a sender
pub fn channel<T: Payload, P: Prepare<T, NC>, const NC: usize>(
    tag: Tag,
    capacity: usize,
    prepare: P,
) -> Result<(PacketSender<T, NC>, Transmitter<T, NC, P>), ConfigError> {
    let (producer, consumer) = queue::bounded(capacity)?;
    Ok((
        PacketSender { tag, producer },
        Transmitter {
            tag,
            consumer,
            prepare,
            scratch: BytesMut::with_capacity(Packet::<T, NC>::ENCODED_LEN),
        },
    ))
}

/// Producer half of a sender
pub struct PacketSender<T: Payload, const NC: usize> {
    tag: Tag,
    producer: Producer<Packet<T, NC>>,
}

impl<T: Payload, const NC: usize> PacketSender<T, NC> {
    /// Destination tag stamped on every packet
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Queue one packet for the UI
    ///
    /// Real-time safe. Returns false when the queue was full and the packet
    /// was dropped.
    #[inline]
    pub fn push_data(&mut self, packet: Packet<T, NC>) -> bool {
        self.producer.push(packet)
    }

    /// Packets dropped because the UI did not drain in time
    pub fn overflow_count(&self) -> usize {
        self.producer.overflow_count()
    }
}

/// Consumer half of a sender, owned by the UI thread
pub struct Transmitter<T: Payload, const NC: usize, P = Passthrough> {
    tag: Tag,
    consumer: Consumer<Packet<T, NC>>,
    prepare: P,
    /// Encoding buffer (reused to avoid allocations)
    scratch: BytesMut,
}

impl<T: Payload, const NC: usize, P: Prepare<T, NC>> Transmitter<T, NC, P> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Pop the next packet with the prepare policy applied
    pub fn recv(&mut self) -> Option<Packet<T, NC>> {
        let mut packet = self.consumer.pop()?;
        self.prepare.prepare(&mut packet);
        Some(packet)
    }

    /// Forward every packet queued so far to `dispatcher`, oldest first
    ///
    /// Packets pushed while this runs are left for the next tick. Returns the
    /// number of packets dispatched.
    pub fn transmit<D: Dispatch + ?Sized>(&mut self, dispatcher: &mut D) -> usize {
        let pending = self.consumer.len();
        let mut sent = 0;

        for _ in 0..pending {
            let Some(packet) = self.recv() else {
                break;
            };

            self.scratch.clear();
            packet.encode_into(&mut self.scratch);
            dispatcher.dispatch(packet.tag, MessageKind::Update, &self.scratch);
            sent += 1;
        }

        sent
    }

    /// Packets waiting in the queue
    pub fn pending(&self) -> usize {
        self.consumer.len()
    }

    /// Packets the producer dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.consumer.overflow_count()
    }
}

/// Type-erased transmitter, as stored by the registry
pub trait Transmit {
    fn tag(&self) -> Tag;

    fn transmit(&mut self, dispatcher: &mut dyn Dispatch) -> usize;

    fn pending(&self) -> usize;

    fn overflow_count(&self) -> usize;
}

impl<T: Payload, const NC: usize, P: Prepare<T, NC>> Transmit for Transmitter<T, NC, P> {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn transmit(&mut self, dispatcher: &mut dyn Dispatch) -> usize {
        Transmitter::transmit(self, dispatcher)
    }

    fn pending(&self) -> usize {
        Transmitter::pending(self)
    }

    fn overflow_count(&self) -> usize {
        Transmitter::overflow_count(self)
    }
}

/// Check a `process_block` channel range against the packet width
#[inline]
pub(crate) fn debug_check_channels<S>(
    inputs: &[&[S]],
    n_frames: usize,
    channel_count: usize,
    channel_offset: usize,
    max_channels: usize,
) {
    debug_assert!(
        channel_offset + channel_count <= max_channels,
        "channel range {}+{} exceeds {} channels",
        channel_offset,
        channel_count,
        max_channels
    );
    debug_assert!(
        inputs.len() >= channel_offset + channel_count,
        "{} input channels given, range needs {}",
        inputs.len(),
        channel_offset + channel_count
    );
    debug_assert!(
        inputs[channel_offset..channel_offset + channel_count]
            .iter()
            .all(|ch| ch.len() >= n_frames),
        "input channel shorter than {} frames",
        n_frames
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Levels;

    #[test]
    fn test_transmit_in_push_order() {
        let (mut tx, mut rx) = channel::<f32, _, 1>(Tag(5), 16, Passthrough).unwrap();

        for i in 0..10 {
            let mut packet = Packet::new(tx.tag());
            packet.values[0] = i as f32;
            assert!(tx.push_data(packet));
        }

        let mut seen = Vec::new();
        let sent = rx.transmit(&mut |tag: Tag, kind: MessageKind, bytes: &[u8]| {
            assert_eq!(tag, Tag(5));
            assert_eq!(kind, MessageKind::Update);
            seen.push(Packet::<f32, 1>::decode(bytes).unwrap().values[0]);
        });

        assert_eq!(sent, 10);
        assert_eq!(seen, (0..10).map(|i| i as f32).collect::<Vec<_>>());

        let mut calls = 0;
        assert_eq!(rx.transmit(&mut |_: Tag, _: MessageKind, _: &[u8]| calls += 1), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_overflow_keeps_oldest() {
        let (mut tx, mut rx) = channel::<f32, _, 1>(Tag(1), 4, Passthrough).unwrap();

        for i in 0..6 {
            let mut packet = Packet::new(tx.tag());
            packet.values[0] = i as f32;
            tx.push_data(packet);
        }

        assert_eq!(tx.overflow_count(), 2);
        let kept: Vec<f32> = std::iter::from_fn(|| rx.recv()).map(|p| p.values[0]).collect();
        assert_eq!(kept, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_to_decibels_prepare() {
        let (mut tx, mut rx) =
            channel::<Levels, _, 2>(Tag(2), 4, ToDecibels { floor_db: -90.0 }).unwrap();

        let mut packet = Packet::new(tx.tag());
        packet.channel_count = 1;
        packet.values[0] = Levels {
            peak: 1.0,
            average: 0.0,
        };
        packet.values[1] = Levels {
            peak: 0.5,
            average: 0.5,
        };
        tx.push_data(packet);

        let out = rx.recv().unwrap();
        assert!(out.values[0].peak.abs() < 1e-6);
        assert_eq!(out.values[0].average, -90.0);
        // outside the populated range, untouched
        assert_eq!(out.values[1].peak, 0.5);
    }

    #[test]
    fn test_closure_prepare() {
        let scale = |p: &mut Packet<f32, 1>| {
            p.values[0] *= 10.0;
        };
        let (mut tx, mut rx) = channel::<f32, _, 1>(Tag(9), 2, scale).unwrap();

        let mut packet = Packet::new(tx.tag());
        packet.values[0] = 0.5;
        tx.push_data(packet);

        assert_eq!(rx.recv().unwrap().values[0], 5.0);
    }
}
