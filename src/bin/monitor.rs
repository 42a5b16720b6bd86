//! Telemetry Monitor
//!
//! Feeds all four senders from the default input device, or from a synthetic
//! tone when no device can be opened, and drains them at the UI tick rate,
//! logging what a meter/scope/analyzer GUI would draw.
//!
//! Usage: `telemetry-monitor [config.toml]`

use anyhow::Result;
use std::f32::consts::PI;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_telemetry::{
    audio::{input_device_names, InputMonitor},
    constants::*,
    dsp::amp_to_db,
    sender::{spectrum::bin_frequency, ToDecibels},
    BufferSender, Dispatch, Levels, MessageKind, Packet, PeakAvgSender, PeakSender,
    SpectrumSender, Tag, TelemetryConfig, TransmitterRegistry,
};

const PEAK_TAG: Tag = Tag(1);
const LEVELS_TAG: Tag = Tag(2);
const SCOPE_TAG: Tag = Tag(3);
const SPECTRUM_TAG: Tag = Tag(4);

/// Producer halves, owned by whichever thread plays the audio callback
struct Senders {
    peak: PeakSender<MAX_CHANNELS>,
    peak_avg: PeakAvgSender<MAX_CHANNELS>,
    buffer: BufferSender<MAX_CHANNELS, MAX_BUFFER_SIZE>,
    spectrum: SpectrumSender<MAX_CHANNELS, MAX_FFT_SIZE>,
}

impl Senders {
    fn process(&mut self, inputs: &[&[f32]], n_frames: usize) {
        let channels = inputs.len().min(MAX_CHANNELS);
        self.peak.process_block(inputs, n_frames, channels, 0);
        self.peak_avg.process_block(inputs, n_frames, channels, 0);
        self.buffer.process_block(inputs, n_frames, channels, 0);
        self.spectrum.process_block(inputs, n_frames, channels, 0);
    }
}

/// Stand-in for the GUI: keeps the latest decoded value per control
struct Display {
    sample_rate: f32,
    fft_size: usize,
    peak: Option<Packet<f32, MAX_CHANNELS>>,
    levels: Option<Packet<Levels, MAX_CHANNELS>>,
    /// Loudest bin and its level in dBFS
    spectrum: Option<(usize, f32)>,
    scope_runs: u64,
    messages: u64,
}

impl Display {
    fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            fft_size,
            peak: None,
            levels: None,
            spectrum: None,
            scope_runs: 0,
            messages: 0,
        }
    }

    fn report(&self, dropped: usize) {
        let peak_db: Vec<String> = self
            .peak
            .iter()
            .flat_map(|p| p.channels().iter())
            .map(|&v| format!("{:.1}", amp_to_db(v, -120.0)))
            .collect();
        let levels: Vec<String> = self
            .levels
            .iter()
            .flat_map(|p| p.channels().iter())
            .map(|l| format!("{:.1}/{:.1}", l.peak, l.average))
            .collect();

        tracing::info!(
            "peak [{}] dB, hold/avg [{}] dB, {} scope runs, {} messages, {} dropped",
            peak_db.join(", "),
            levels.join(", "),
            self.scope_runs,
            self.messages,
            dropped
        );

        if let Some((bin, db)) = self.spectrum {
            tracing::info!(
                "spectrum peak {:.0} Hz at {:.1} dB",
                bin_frequency(bin, self.fft_size, self.sample_rate),
                db
            );
        }
    }
}

impl Dispatch for Display {
    fn dispatch(&mut self, tag: Tag, _kind: MessageKind, payload: &[u8]) {
        self.messages += 1;

        let decoded = match tag {
            PEAK_TAG => Packet::decode(payload).map(|p| self.peak = Some(p)),
            LEVELS_TAG => Packet::decode(payload).map(|p| self.levels = Some(p)),
            SCOPE_TAG => Packet::<[f32; MAX_BUFFER_SIZE], MAX_CHANNELS>::decode(payload)
                .map(|_| self.scope_runs += 1),
            SPECTRUM_TAG => {
                Packet::<[f32; MAX_FFT_SIZE], MAX_CHANNELS>::decode(payload).map(|p| {
                    let half = self.fft_size / 2;
                    self.spectrum = p.channels().first().and_then(|bins| {
                        bins[..=half]
                            .iter()
                            .copied()
                            .enumerate()
                            .max_by(|a, b| a.1.total_cmp(&b.1))
                    });
                })
            }
            other => {
                tracing::debug!("Message for unknown control {}", other);
                Ok(())
            }
        };

        if let Err(e) = decoded {
            tracing::warn!("Bad packet for {}: {}", tag, e);
        }
    }
}

/// Synthetic stereo source: 440 Hz left, 1 kHz right, one second on and one
/// second off
fn spawn_tone(
    mut senders: Senders,
    sample_rate: u32,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    const BLOCK: usize = 256;

    thread::Builder::new()
        .name("telemetry-synth".to_string())
        .spawn(move || {
            let rate = sample_rate as u64;
            let period = Duration::from_secs_f64(BLOCK as f64 / sample_rate as f64);
            let mut left = [0.0f32; BLOCK];
            let mut right = [0.0f32; BLOCK];
            let mut t: u64 = 0;

            while running.load(Ordering::Relaxed) {
                for i in 0..BLOCK {
                    let n = t + i as u64;
                    let on = if (n / rate) % 2 == 0 { 1.0 } else { 0.0 };
                    let s = (n % rate) as f32 / sample_rate as f32;
                    left[i] = on * 0.5 * (2.0 * PI * 440.0 * s).sin();
                    right[i] = on * 0.25 * (2.0 * PI * 1000.0 * s).sin();
                }
                t += BLOCK as u64;

                senders.process(&[&left[..], &right[..]], BLOCK);
                thread::sleep(period);
            }
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting telemetry monitor");

    let config = match std::env::args().nth(1) {
        Some(path) => TelemetryConfig::load(Path::new(&path))?,
        None => TelemetryConfig::load_or_default()?,
    };

    for name in input_device_names() {
        tracing::info!("Input device: {}", name);
    }

    let capacity = config.queue_capacity;
    let (peak, peak_rx) =
        PeakSender::<MAX_CHANNELS>::new(PEAK_TAG, capacity, config.peak_settings())?;
    let (peak_avg, levels_rx) = PeakAvgSender::<MAX_CHANNELS>::with_prepare(
        LEVELS_TAG,
        capacity,
        config.peak_avg_settings(),
        ToDecibels::default(),
    )?;
    let (buffer, scope_rx) = BufferSender::<MAX_CHANNELS, MAX_BUFFER_SIZE>::new(
        SCOPE_TAG,
        capacity,
        config.buffer_settings(),
    )?;
    let (spectrum, spectrum_rx) = SpectrumSender::<MAX_CHANNELS, MAX_FFT_SIZE>::with_prepare(
        SPECTRUM_TAG,
        capacity,
        config.spectrum_settings(),
        ToDecibels::default(),
    )?;

    let mut registry = TransmitterRegistry::new();
    registry.register(peak_rx);
    registry.register(levels_rx);
    registry.register(scope_rx);
    registry.register(spectrum_rx);

    let senders = Senders {
        peak,
        peak_avg,
        buffer,
        spectrum,
    };

    let running = Arc::new(AtomicBool::new(true));
    let mut synth = None;
    let mut monitor = match InputMonitor::new(None, Some(config.sample_rate)) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            tracing::warn!("No live input ({}), using synthetic tone", e);
            None
        }
    };

    match monitor.as_mut() {
        Some(monitor) => {
            let mut senders = senders;
            monitor.start(move |inputs, n_frames| senders.process(inputs, n_frames))?;
            tracing::info!("Input stream started");
        }
        None => {
            synth = Some(spawn_tone(senders, config.sample_rate, running.clone())?);
        }
    }

    let mut display = Display::new(config.sample_rate, config.spectrum.fft_size);
    let mut tick = tokio::time::interval(Duration::from_secs_f64(1.0 / IDLE_TICK_HZ as f64));
    let mut report = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                registry.transmit_all(&mut display);

                if let Some(monitor) = monitor.as_ref() {
                    while let Some(err) = monitor.check_errors() {
                        tracing::warn!("Input stream: {}", err);
                    }
                    if !monitor.is_running() {
                        tracing::error!("Input stream stopped");
                        break;
                    }
                }
            }
            _ = report.tick() => {
                display.report(registry.overflow_total());
            }
            _ = &mut ctrl_c => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    if let Some(handle) = synth {
        let _ = handle.join();
    }
    if let Some(mut monitor) = monitor {
        monitor.stop();
    }

    Ok(())
}
