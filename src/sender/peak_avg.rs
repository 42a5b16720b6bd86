//! Peak-hold and smoothed average/RMS sender
//!
//! Per channel and per window, reports a held peak and an envelope-followed
//! average. The held peak freezes for `peak_hold` samples after it was
//! captured; once that time is spent, the next window boundary replaces it
//! with that window's raw peak (a hard reset, not a smooth fall).

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_THRESHOLD;
use crate::dsp::{flush_denormal, Sample};
use crate::error::ConfigError;
use crate::packet::{Levels, Packet, Tag};
use crate::sender::gate::Gate;
use crate::sender::{self, debug_check_channels, PacketSender, Passthrough, Prepare, Transmitter};

/// How the raw average of a window is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AverageMode {
    /// Mean of `|x|`
    #[default]
    Average,
    /// Root mean square
    Rms,
}

/// Peak+average sender settings, all times in samples
#[derive(Debug, Clone, PartialEq)]
pub struct PeakAvgSettings {
    pub window: usize,
    pub peak_hold: usize,
    pub attack: f32,
    pub decay: f32,
    pub mode: AverageMode,
    pub threshold: f32,
}

impl Default for PeakAvgSettings {
    fn default() -> Self {
        Self {
            window: 240,
            peak_hold: 24_000,
            attack: 48.0,
            decay: 4_800.0,
            mode: AverageMode::Average,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// One-pole coefficient for a window of `window` samples and a time
/// constant of `time` samples
fn follower_coeff(window: usize, time: f32) -> f32 {
    if time <= 1.0 {
        return 1.0;
    }
    1.0 - (-(window as f32) / time).exp()
}

/// Producer half of the peak+average sender
pub struct PeakAvgSender<const NC: usize> {
    sender: PacketSender<Levels, NC>,
    gate: Gate,
    window: usize,
    inv_window: f32,
    peak_hold: usize,
    attack_coeff: f32,
    decay_coeff: f32,
    mode: AverageMode,

    raw_peak: [f32; NC],
    sums: [f32; NC],
    count: usize,

    held_peak: [f32; NC],
    hold_left: [usize; NC],
    envelope: [f32; NC],
}

impl<const NC: usize> PeakAvgSender<NC> {
    pub fn new(
        tag: Tag,
        capacity: usize,
        settings: PeakAvgSettings,
    ) -> Result<(Self, Transmitter<Levels, NC>), ConfigError> {
        Self::with_prepare(tag, capacity, settings, Passthrough)
    }

    pub fn with_prepare<P: Prepare<Levels, NC>>(
        tag: Tag,
        capacity: usize,
        settings: PeakAvgSettings,
        prepare: P,
    ) -> Result<(Self, Transmitter<Levels, NC, P>), ConfigError> {
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
                peak_hold: settings.peak_hold,
                attack_coeff: follower_coeff(settings.window, settings.attack),
                decay_coeff: follower_coeff(settings.window, settings.decay),
                mode: settings.mode,
                raw_peak: [0.0; NC],
                sums: [0.0; NC],
                count: 0,
                held_peak: [0.0; NC],
                hold_left: [0; NC],
                envelope: [0.0; NC],
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
                let x = inputs[ch][s].to_f32();
                let magnitude = x.abs();

                if magnitude > self.raw_peak[ch] {
                    self.raw_peak[ch] = magnitude;
                }
                self.sums[ch] += match self.mode {
                    AverageMode::Average => magnitude,
                    AverageMode::Rms => x * x,
                };
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
        let mut holding = false;
        for ch in channel_offset..channel_offset + channel_count {
            let raw_peak = self.raw_peak[ch];
            let raw_average = match self.mode {
                AverageMode::Average => self.sums[ch] * self.inv_window,
                AverageMode::Rms => (self.sums[ch] * self.inv_window).sqrt(),
            };

            let was_holding = self.hold_left[ch] > 0;
            if raw_peak > self.held_peak[ch] {
                self.held_peak[ch] = raw_peak;
                self.hold_left[ch] = self.peak_hold;
            } else if self.hold_left[ch] == 0 {
                self.held_peak[ch] = raw_peak;
            } else {
                self.hold_left[ch] = self.hold_left[ch].saturating_sub(self.window);
            }

            let env = self.envelope[ch];
            let coeff = if raw_average > env {
                self.attack_coeff
            } else {
                self.decay_coeff
            };
            self.envelope[ch] = flush_denormal(env + (raw_average - env) * coeff);

            packet.values[ch] = Levels {
                peak: self.held_peak[ch],
                average: self.envelope[ch],
            };
            level += self.held_peak[ch] + self.envelope[ch];
            holding |= was_holding || self.hold_left[ch] > 0;
        }

        self.raw_peak = [0.0; NC];
        self.sums = [0.0; NC];
        self.count = 0;

        // a running hold keeps packets flowing even below threshold
        if self.gate.admit_held(level, holding) {
            self.sender.push_data(packet);
        }
    }

    pub fn tag(&self) -> Tag {
        self.sender.tag()
    }

    /// Packets dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.sender.overflow_count()
    }
}
