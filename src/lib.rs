//! # Audio Telemetry
//!
//! Lock-free measurement pipeline from a real-time audio callback to a UI
//! thread: block levels, peak-hold meters, waveform snapshots and overlapped
//! STFT spectra.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           AUDIO THREAD                                  │
//! │                                                                         │
//! │   process_block(inputs, n_frames, channel_count, channel_offset)       │
//! │         │                │                 │                │           │
//! │         ▼                ▼                 ▼                ▼           │
//! │  ┌────────────┐  ┌──────────────┐  ┌─────────────┐  ┌──────────────┐    │
//! │  │ PeakSender │  │PeakAvgSender │  │BufferSender │  │SpectrumSender│    │
//! │  │ mean |x|   │  │ hold + env   │  │ raw samples │  │ overlap STFT │    │
//! │  └─────┬──────┘  └──────┬───────┘  └──────┬──────┘  └──────┬───────┘    │
//! │        │    gate        │    gate         │   gate         │   gate     │
//! │        ▼                ▼                 ▼                ▼            │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │        PacketSender::push_data  (queue::Producer, no alloc)     │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────┼────────────────────────────────────┘
//!                                      │ SPSC ring, one per sender
//!                                      ▼
//! ┌────────────────────────────────────┼────────────────────────────────────┐
//! │                             UI THREAD (idle tick)                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │   TransmitterRegistry::transmit_all                             │    │
//! │  │     Transmitter: pop ─► Prepare ─► encode ─► Dispatch           │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                    (tag, MessageKind::Update, bytes)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod dsp;
pub mod error;
pub mod packet;
pub mod queue;
pub mod registry;
pub mod sender;

pub use config::TelemetryConfig;
pub use dispatch::{ChannelDispatcher, Dispatch, MessageKind, UiMessage};
pub use error::{Error, Result};
pub use packet::{Levels, Packet, Tag};
pub use registry::TransmitterRegistry;
pub use sender::{
    BufferSender, PeakAvgSender, PeakSender, SpectrumSender, Transmit, Transmitter,
};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for the live harness
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default packets per sender queue
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    /// Default gate threshold in dBFS
    pub const DEFAULT_THRESHOLD_DB: f32 = -100.0;

    /// Default gate threshold, linear (-100 dBFS)
    pub const DEFAULT_THRESHOLD: f32 = 1.0e-5;

    /// Default meter window in milliseconds
    pub const DEFAULT_WINDOW_MS: f32 = 5.0;

    /// Default peak hold time in milliseconds
    pub const DEFAULT_PEAK_HOLD_MS: f32 = 500.0;

    /// Default envelope attack in milliseconds
    pub const DEFAULT_ATTACK_MS: f32 = 1.0;

    /// Default envelope decay in milliseconds
    pub const DEFAULT_DECAY_MS: f32 = 100.0;

    /// Default waveform run length in samples
    pub const DEFAULT_BUFFER_SIZE: usize = 512;

    /// Default FFT length
    pub const DEFAULT_FFT_SIZE: usize = 1024;

    /// Default number of overlapping STFT frames
    pub const DEFAULT_OVERLAP: usize = 2;

    /// Channels carried per packet by the live harness
    pub const MAX_CHANNELS: usize = 2;

    /// Largest waveform run the live harness can carry
    pub const MAX_BUFFER_SIZE: usize = 2048;

    /// Largest FFT the live harness can carry
    pub const MAX_FFT_SIZE: usize = 4096;

    /// UI idle tick rate
    pub const IDLE_TICK_HZ: u32 = 30;
}
