//! Telemetry configuration
//!
//! Times are given in milliseconds and thresholds in dBFS; both are converted
//! to sample counts and linear levels for the configured sample rate.
//! Thresholds are a mean per-sample level summed over the active channels,
//! the same sum every gate compares against, so a stereo signal opens a gate
//! at half the per-channel level a mono one needs. A threshold of `-inf`
//! disables gating for that sender. Windows that round to zero samples are
//! rejected.
//!
//! ```toml
//! sample_rate = 48000
//! queue_capacity = 64
//!
//! [peak_avg]
//! peak_hold_ms = 1000.0
//! mode = "rms"
//!
//! [spectrum]
//! fft_size = 2048
//! window = "blackman_harris"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::dsp::{db_to_amp, ms_to_samples, WindowKind};
use crate::error::{ConfigError, Result};
use crate::sender::{
    AverageMode, BufferSettings, PeakAvgSettings, PeakSettings, SpectrumOutput, SpectrumSettings,
};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub sample_rate: u32,
    /// Packets each sender queue can hold between two idle ticks
    pub queue_capacity: usize,
    pub peak: PeakConfig,
    pub peak_avg: PeakAvgConfig,
    pub buffer: BufferConfig,
    pub spectrum: SpectrumConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    pub window_ms: f32,
    pub threshold_db: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakAvgConfig {
    pub window_ms: f32,
    pub peak_hold_ms: f32,
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub mode: AverageMode,
    pub threshold_db: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub buffer_size: usize,
    /// Mean level per sample summed over channels, scaled by the buffer
    /// length for the gate
    pub threshold_db: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    pub overlap: usize,
    pub window: WindowKind,
    pub output: SpectrumOutput,
    /// Mean level per sample summed over channels, scaled by the FFT length
    /// for the gate
    pub threshold_db: f32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            peak: PeakConfig::default(),
            peak_avg: PeakAvgConfig::default(),
            buffer: BufferConfig::default(),
            spectrum: SpectrumConfig::default(),
        }
    }
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            threshold_db: DEFAULT_THRESHOLD_DB,
        }
    }
}

impl Default for PeakAvgConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            peak_hold_ms: DEFAULT_PEAK_HOLD_MS,
            attack_ms: DEFAULT_ATTACK_MS,
            decay_ms: DEFAULT_DECAY_MS,
            mode: AverageMode::Average,
            threshold_db: DEFAULT_THRESHOLD_DB,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            threshold_db: DEFAULT_THRESHOLD_DB,
        }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            overlap: DEFAULT_OVERLAP,
            window: WindowKind::Hann,
            output: SpectrumOutput::Magnitude,
            threshold_db: DEFAULT_THRESHOLD_DB,
        }
    }
}

fn check_time(field: &'static str, ms: f32) -> std::result::Result<(), ConfigError> {
    if ms.is_finite() && ms >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Time { field, ms })
    }
}

impl TelemetryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded telemetry config from {}", path.display());
        Ok(config)
    }

    /// Load the per-user configuration file, falling back to defaults
    ///
    /// A missing file is not an error. A file that exists but cannot be read
    /// or parsed is.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Per-user config file location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "audio-telemetry", "audio-telemetry")
            .map(|dirs| dirs.config_dir().join("telemetry.toml"))
    }

    /// Check everything that does not depend on packet dimensions
    ///
    /// Window, buffer and FFT sizes are checked again by the sender
    /// constructors against their compile-time capacities.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate(self.sample_rate as f32));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        check_time("peak.window_ms", self.peak.window_ms)?;
        check_time("peak_avg.window_ms", self.peak_avg.window_ms)?;
        check_time("peak_avg.peak_hold_ms", self.peak_avg.peak_hold_ms)?;
        check_time("peak_avg.attack_ms", self.peak_avg.attack_ms)?;
        check_time("peak_avg.decay_ms", self.peak_avg.decay_ms)?;

        for ms in [self.peak.window_ms, self.peak_avg.window_ms] {
            if ms_to_samples(ms, self.rate()) == 0 {
                return Err(ConfigError::ZeroWindow);
            }
        }

        if self.buffer.buffer_size == 0 {
            return Err(ConfigError::BufferSize {
                size: 0,
                max: MAX_BUFFER_SIZE,
            });
        }
        if !self.spectrum.fft_size.is_power_of_two() || self.spectrum.fft_size < 2 {
            return Err(ConfigError::FftSize {
                size: self.spectrum.fft_size,
                max: MAX_FFT_SIZE,
            });
        }
        if self.spectrum.overlap == 0 || self.spectrum.overlap > self.spectrum.fft_size {
            return Err(ConfigError::Overlap {
                overlap: self.spectrum.overlap,
                fft_size: self.spectrum.fft_size,
            });
        }
        Ok(())
    }

    fn rate(&self) -> f32 {
        self.sample_rate as f32
    }

    pub fn peak_settings(&self) -> PeakSettings {
        PeakSettings {
            window: ms_to_samples(self.peak.window_ms, self.rate()),
            threshold: db_to_amp(self.peak.threshold_db),
        }
    }

    pub fn peak_avg_settings(&self) -> PeakAvgSettings {
        let rate = self.rate();
        let c = &self.peak_avg;
        PeakAvgSettings {
            window: ms_to_samples(c.window_ms, rate),
            peak_hold: (c.peak_hold_ms * 0.001 * rate).round() as usize,
            attack: c.attack_ms * 0.001 * rate,
            decay: c.decay_ms * 0.001 * rate,
            mode: c.mode,
            threshold: db_to_amp(c.threshold_db),
        }
    }

    pub fn buffer_settings(&self) -> BufferSettings {
        BufferSettings {
            buffer_size: self.buffer.buffer_size,
            threshold: db_to_amp(self.buffer.threshold_db) * self.buffer.buffer_size as f32,
        }
    }

    pub fn spectrum_settings(&self) -> SpectrumSettings {
        let c = &self.spectrum;
        SpectrumSettings {
            fft_size: c.fft_size,
            overlap: c.overlap,
            window: c.window,
            output: c.output,
            threshold: db_to_amp(c.threshold_db) * c.fft_size as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Tag;
    use crate::sender::BufferSender;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_sender_defaults() {
        let config = TelemetryConfig::default();
        config.validate().unwrap();

        let peak = config.peak_settings();
        assert_eq!(peak.window, PeakSettings::default().window);
        assert_relative_eq!(peak.threshold, DEFAULT_THRESHOLD, max_relative = 1e-4);

        let peak_avg = config.peak_avg_settings();
        let expected = PeakAvgSettings::default();
        assert_eq!(peak_avg.window, expected.window);
        assert_eq!(peak_avg.peak_hold, expected.peak_hold);
        assert_relative_eq!(peak_avg.attack, expected.attack, max_relative = 1e-4);
        assert_relative_eq!(peak_avg.decay, expected.decay, max_relative = 1e-4);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = TelemetryConfig::from_toml_str(
            r#"
            sample_rate = 44100
            queue_capacity = 16

            [peak_avg]
            peak_hold_ms = 1000.0
            mode = "rms"

            [spectrum]
            fft_size = 2048
            overlap = 4
            window = "blackman_harris"
            output = "complex"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.peak, PeakConfig::default());

        let peak_avg = config.peak_avg_settings();
        assert_eq!(peak_avg.peak_hold, 44100);
        assert_eq!(peak_avg.mode, AverageMode::Rms);

        let spectrum = config.spectrum_settings();
        assert_eq!(spectrum.fft_size, 2048);
        assert_eq!(spectrum.window, WindowKind::BlackmanHarris);
        assert_eq!(spectrum.output, SpectrumOutput::Complex);
    }

    #[test]
    fn test_negative_infinity_disables_gate() {
        let config = TelemetryConfig::from_toml_str("[buffer]\nthreshold_db = -inf\n").unwrap();
        assert_eq!(config.buffer_settings().threshold, 0.0);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(
            TelemetryConfig::from_toml_str("sample_rate = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(
            TelemetryConfig::from_toml_str("sample_rate = 0"),
            Err(ConfigError::SampleRate(0.0))
        );
        assert_eq!(
            TelemetryConfig::from_toml_str("queue_capacity = 0"),
            Err(ConfigError::ZeroCapacity)
        );
        assert!(matches!(
            TelemetryConfig::from_toml_str("[spectrum]\nfft_size = 1000\n"),
            Err(ConfigError::FftSize { size: 1000, .. })
        ));
        assert!(matches!(
            TelemetryConfig::from_toml_str("[peak_avg]\ndecay_ms = -5.0\n"),
            Err(ConfigError::Time {
                field: "peak_avg.decay_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_sub_sample_window_rejected() {
        assert_eq!(
            TelemetryConfig::from_toml_str("[peak]\nwindow_ms = 0.0\n"),
            Err(ConfigError::ZeroWindow)
        );
        assert_eq!(
            TelemetryConfig::from_toml_str("[peak_avg]\nwindow_ms = 0.01\n"),
            Err(ConfigError::ZeroWindow)
        );
        // 0.02 ms is one sample at 48 kHz
        let config = TelemetryConfig::from_toml_str("[peak]\nwindow_ms = 0.02\n").unwrap();
        assert_eq!(config.peak_settings().window, 1);
    }

    #[test]
    fn test_thresholds_apply_to_channel_sum() {
        let config = TelemetryConfig::from_toml_str(
            "[buffer]\nbuffer_size = 4\nthreshold_db = -20.0\n",
        )
        .unwrap();
        let quiet = [0.06f32; 4];

        // 0.06 per sample is under the -20 dBFS threshold on one channel,
        // two channels together clear it
        let (mut stereo, mut stereo_rx) =
            BufferSender::<2, 8>::new(Tag(1), 4, config.buffer_settings()).unwrap();
        stereo.process_block(&[&quiet[..], &quiet[..]], 4, 2, 0);
        assert!(stereo_rx.recv().is_some());

        let (mut mono, mut mono_rx) =
            BufferSender::<2, 8>::new(Tag(2), 4, config.buffer_settings()).unwrap();
        mono.process_block(&[&quiet[..]], 4, 1, 0);
        assert!(mono_rx.recv().is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = TelemetryConfig::default();
        config.spectrum.window = WindowKind::FlatTop;
        config.peak_avg.mode = AverageMode::Rms;

        let text = config.to_toml_string().unwrap();
        assert_eq!(TelemetryConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = TelemetryConfig::load(Path::new("/nonexistent/telemetry.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
