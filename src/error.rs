//! Error types for the telemetry pipeline
//!
//! Nothing on the audio thread returns these. They come out of construction,
//! reconfiguration, configuration loading and the UI-side packet decoder.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid sender or queue settings
///
/// These are programmer errors at the call site. They are reported, never
/// clamped into range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("Window size must be at least 1 sample")]
    ZeroWindow,

    #[error("Buffer size {size} outside 1..={max}")]
    BufferSize { size: usize, max: usize },

    #[error("FFT size {size} must be a power of two in 2..={max}")]
    FftSize { size: usize, max: usize },

    #[error("Overlap {overlap} must be in 1..={fft_size}")]
    Overlap { overlap: usize, fft_size: usize },

    #[error("Sample rate must be positive, got {0}")]
    SampleRate(f32),

    #[error("{field} must be a finite, non-negative time, got {ms} ms")]
    Time { field: &'static str, ms: f32 },

    #[error("Invalid config file: {0}")]
    Parse(String),
}

/// UI-side packet decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Payload length {actual} does not match packet size {expected}")]
    Length { expected: usize, actual: usize },

    #[error("Channel range {offset}+{count} exceeds {max} channels")]
    ChannelRange { offset: usize, count: usize, max: usize },
}

/// Live input harness errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
