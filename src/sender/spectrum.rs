//! Overlapped STFT spectrum sender
//!
//! `overlap` analysis frames run side by side, their write positions
//! staggered by `fft_size / overlap` samples. Every incoming sample is
//! windowed and written into each frame at that frame's position. When a
//! frame fills up it is transformed in place, the result is written into the
//! outgoing packet and the frame starts over, so a fresh spectrum appears
//! every `fft_size / overlap` samples.
//!
//! The FFT is planned and its scratch allocated ahead of time; transforming a
//! frame on the audio thread does not allocate.
//!
//! Packet layout per channel, for an `n`-point transform:
//!
//! * [`SpectrumOutput::Magnitude`]: bins `0..=n/2` hold
//!   `sqrt(2 * |X[k]|^2 / sum(w^2))`;
//! * [`SpectrumOutput::Complex`]: `re(X[k])` for `k < n/2` in the first half,
//!   `im(X[k])` in the second half.
//!
//! Values past those ranges are unspecified.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::DEFAULT_THRESHOLD;
use crate::dsp::{Sample, WindowKind};
use crate::error::ConfigError;
use crate::packet::{Packet, Tag};
use crate::sender::gate::Gate;
use crate::sender::{self, debug_check_channels, PacketSender, Passthrough, Prepare, Transmitter};

/// What a spectrum packet carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumOutput {
    #[default]
    Magnitude,
    Complex,
}

/// Spectrum sender settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSettings {
    pub fft_size: usize,
    pub overlap: usize,
    pub window: WindowKind,
    pub output: SpectrumOutput,
    /// Summed `|x|` over one frame below which it counts as silent
    pub threshold: f32,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            overlap: 2,
            window: WindowKind::Hann,
            output: SpectrumOutput::Magnitude,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Centre frequency of `bin` for an `fft_size`-point transform
pub fn bin_frequency(bin: usize, fft_size: usize, sample_rate: f32) -> f32 {
    bin as f32 * sample_rate / fft_size as f32
}

struct StftFrame<const NC: usize> {
    pos: usize,
    level: f32,
    bins: [Vec<Complex<f32>>; NC],
}

/// Producer half of the spectrum sender
///
/// `N` is the largest FFT size a packet can carry.
pub struct SpectrumSender<const NC: usize, const N: usize> {
    sender: PacketSender<[f32; N], NC>,
    gate: Gate,
    fft_size: usize,
    overlap: usize,
    window_kind: WindowKind,
    output: SpectrumOutput,

    window: Vec<f32>,
    scaling: f32,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    frames: Vec<StftFrame<NC>>,
    packet: Packet<[f32; N], NC>,
    transforms: u64,
}

impl<const NC: usize, const N: usize> SpectrumSender<NC, N> {
    pub fn new(
        tag: Tag,
        capacity: usize,
        settings: SpectrumSettings,
    ) -> Result<(Self, Transmitter<[f32; N], NC>), ConfigError> {
        Self::with_prepare(tag, capacity, settings, Passthrough)
    }

    pub fn with_prepare<P: Prepare<[f32; N], NC>>(
        tag: Tag,
        capacity: usize,
        settings: SpectrumSettings,
        prepare: P,
    ) -> Result<(Self, Transmitter<[f32; N], NC, P>), ConfigError> {
        Self::validate(settings.fft_size, settings.overlap)?;

        let (sender, transmitter) = sender::channel(tag, capacity, prepare)?;
        let mut planner = FftPlanner::new();
        let mut this = Self {
            sender,
            gate: Gate::new(settings.threshold),
            fft_size: settings.fft_size,
            overlap: settings.overlap,
            window_kind: settings.window,
            output: settings.output,
            window: Vec::new(),
            scaling: 1.0,
            fft: planner.plan_fft_forward(settings.fft_size),
            scratch: Vec::new(),
            frames: Vec::new(),
            packet: Packet::new(tag),
            transforms: 0,
        };
        this.rebuild();

        Ok((this, transmitter))
    }

    fn validate(fft_size: usize, overlap: usize) -> Result<(), ConfigError> {
        if !fft_size.is_power_of_two() || fft_size < 2 || fft_size > N {
            return Err(ConfigError::FftSize {
                size: fft_size,
                max: N,
            });
        }
        if overlap == 0 || overlap > fft_size {
            return Err(ConfigError::Overlap { overlap, fft_size });
        }
        Ok(())
    }

    /// Recompute window, scaling and scratch, and restart every frame
    fn rebuild(&mut self) {
        self.window.resize(self.fft_size, 0.0);
        self.scaling = self.window_kind.fill(&mut self.window);

        let scratch_len = self.fft.get_inplace_scratch_len();
        self.scratch.clear();
        self.scratch.resize(scratch_len, Complex::default());

        self.reset_frames();
    }

    fn reset_frames(&mut self) {
        let hop = self.hop_size();
        let fft_size = self.fft_size;

        self.frames = (0..self.overlap)
            .map(|i| StftFrame {
                pos: i * hop,
                level: 0.0,
                bins: std::array::from_fn(|_| vec![Complex::default(); fft_size]),
            })
            .collect();
        self.gate.reset();
    }

    /// Change FFT size and overlap
    ///
    /// Partially filled frames are discarded. Allocates: call between audio
    /// blocks, never from inside the callback.
    pub fn reconfigure(&mut self, fft_size: usize, overlap: usize) -> Result<(), ConfigError> {
        Self::validate(fft_size, overlap)?;

        if fft_size != self.fft_size {
            self.fft = FftPlanner::new().plan_fft_forward(fft_size);
        }
        self.fft_size = fft_size;
        self.overlap = overlap;
        self.rebuild();

        tracing::debug!(
            "Spectrum {} reconfigured: fft {} overlap {}",
            self.sender.tag(),
            fft_size,
            overlap
        );
        Ok(())
    }

    /// Change the analysis window, restarting every frame
    pub fn set_window(&mut self, window: WindowKind) {
        self.window_kind = window;
        self.scaling = self.window_kind.fill(&mut self.window);
        self.reset_frames();
    }

    /// Switch between magnitude and complex output
    pub fn set_output(&mut self, output: SpectrumOutput) {
        self.output = output;
    }

    /// Window and transform one audio block
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
            for index in 0..self.frames.len() {
                let frame = &mut self.frames[index];
                let pos = frame.pos;
                let w = self.window[pos];

                for ch in channels.clone() {
                    let x = inputs[ch][s].to_f32();
                    frame.bins[ch][pos] = Complex::new(x * w, 0.0);
                    frame.level += x.abs();
                }

                frame.pos += 1;
                if frame.pos == self.fft_size {
                    self.complete_frame(index, channel_count, channel_offset);
                }
            }
        }
    }

    fn complete_frame(&mut self, index: usize, channel_count: usize, channel_offset: usize) {
        let n = self.fft_size;
        let half = n / 2;
        let inv_scaling = 2.0 / self.scaling;
        let frame = &mut self.frames[index];

        for ch in channel_offset..channel_offset + channel_count {
            let bins = &mut frame.bins[ch];
            self.fft.process_with_scratch(bins, &mut self.scratch);

            let out = &mut self.packet.values[ch];
            match self.output {
                SpectrumOutput::Magnitude => {
                    for k in 0..=half {
                        out[k] = (bins[k].norm_sqr() * inv_scaling).sqrt();
                    }
                }
                SpectrumOutput::Complex => {
                    for k in 0..half {
                        out[k] = bins[k].re;
                        out[half + k] = bins[k].im;
                    }
                }
            }
        }

        let level = frame.level;
        frame.level = 0.0;
        frame.pos = 0;
        self.transforms += 1;

        self.packet.channel_count = channel_count;
        self.packet.channel_offset = channel_offset;
        if self.gate.admit(level) {
            self.sender.push_data(self.packet);
        }
    }

    pub fn tag(&self) -> Tag {
        self.sender.tag()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Samples between consecutive transforms
    pub fn hop_size(&self) -> usize {
        self.fft_size / self.overlap
    }

    pub fn window_kind(&self) -> WindowKind {
        self.window_kind
    }

    pub fn output(&self) -> SpectrumOutput {
        self.output
    }

    /// Sum of squared window coefficients
    pub fn scaling_factor(&self) -> f32 {
        self.scaling
    }

    /// Frames transformed since construction, gated or not
    pub fn transforms_completed(&self) -> u64 {
        self.transforms
    }

    /// Packets dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.sender.overflow_count()
    }
}
