//! Block-averaged level sender
//!
//! Every `window` samples, reports the mean absolute value of each active
//! channel over that window.

use crate::constants::DEFAULT_THRESHOLD;
use crate::dsp::Sample;
use crate::error::ConfigError;
use crate::packet::{Packet, Tag};
use crate::sender::gate::Gate;
use crate::sender::{self, debug_check_channels, PacketSender, Passthrough, Prepare, Transmitter};

/// Peak sender settings
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSettings {
    /// Samples per reported value, at least one
    pub window: usize,
    /// Linear level below which windows count as silent
    pub threshold: f32,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            window: 240,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Producer half of the peak sender
pub struct PeakSender<const NC: usize> {
    sender: PacketSender<f32, NC>,
    gate: Gate,
    window: usize,
    inv_window: f32,
    sums: [f32; NC],
    count: usize,
}

impl<const NC: usize> PeakSender<NC> {
    pub fn new(
        tag: Tag,
        capacity: usize,
        settings: PeakSettings,
    ) -> Result<(Self, Transmitter<f32, NC>), ConfigError> {
        Self::with_prepare(tag, capacity, settings, Passthrough)
    }

    pub fn with_prepare<P: Prepare<f32, NC>>(
        tag: Tag,
        capacity: usize,
        settings: PeakSettings,
        prepare: P,
    ) -> Result<(Self, Transmitter<f32, NC, P>), ConfigError> {
        if settings.window == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        let (sender, transmitter) = sender::channel(tag, capacity, prepare)?;
        Ok((
            Self {
                sender,
                gate: Gate::new(settings.threshold),
                window: settings.window,
                inv_window: 1.0 / settings.window as f32,
                sums: [0.0; NC],
                count: 0,
            },
            transmitter,
        ))
    }

    /// Accumulate one audio block, pushing a packet per completed window
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
                self.sums[ch] += inputs[ch][s].to_f32().abs();
            }

            self.count += 1;
            if self.count == self.window {
                self.complete_window(channel_count, channel_offset);
            }
        }
    }

    fn complete_window(&mut self, channel_count: usize, channel_offset: usize) {
        let mut packet = Packet::new(self.sender.tag());
        packet.channel_count = channel_count;
        packet.channel_offset = channel_offset;

        let mut level = 0.0;
        for ch in channel_offset..channel_offset + channel_count {
            let mean = self.sums[ch] * self.inv_window;
            packet.values[ch] = mean;
            level += mean;
        }

        self.sums = [0.0; NC];
        self.count = 0;

        if self.gate.admit(level) {
            self.sender.push_data(packet);
        }
    }

    pub fn tag(&self) -> Tag {
        self.sender.tag()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Packets dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.sender.overflow_count()
    }
}
