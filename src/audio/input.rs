//! Live input stream feeding the senders
//!
//! Opens a cpal input device on a dedicated thread and runs a per-block
//! closure on its audio callback. Interleaved device data is split into
//! per-channel buffers allocated before the stream starts, so the callback
//! path stays allocation-free.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::AudioError;

/// Channels split out of the interleaved stream, the rest are ignored
pub const MAX_INPUT_CHANNELS: usize = 8;

/// Default per-channel scratch length in frames
pub const DEFAULT_MAX_BLOCK: usize = 1024;

/// Splits interleaved blocks into per-channel slices
///
/// Blocks longer than the scratch are handed on in several pieces.
pub struct Deinterleaver {
    channels: usize,
    stride: usize,
    buffers: Vec<Vec<f32>>,
}

impl Deinterleaver {
    /// `stride` is the device channel count, of which the first
    /// `MAX_INPUT_CHANNELS` are kept
    pub fn new(stride: usize, max_block: usize) -> Self {
        let channels = stride.min(MAX_INPUT_CHANNELS);
        Self {
            channels,
            stride,
            buffers: vec![vec![0.0; max_block.max(1)]; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Run `f(inputs, n_frames)` over `data` in scratch-sized pieces
    ///
    /// Returns the number of frames processed.
    pub fn process(&mut self, data: &[f32], mut f: impl FnMut(&[&[f32]], usize)) -> usize {
        if self.stride == 0 {
            return 0;
        }

        let max_block = self.buffers.first().map_or(0, Vec::len);
        let total = data.len() / self.stride;
        let mut done = 0;

        while done < total {
            let n = (total - done).min(max_block);
            let frames = &data[done * self.stride..(done + n) * self.stride];

            for (i, frame) in frames.chunks_exact(self.stride).enumerate() {
                for (ch, buffer) in self.buffers.iter_mut().enumerate() {
                    buffer[i] = frame[ch];
                }
            }

            let empty: &[f32] = &[];
            let mut views = [empty; MAX_INPUT_CHANNELS];
            for (view, buffer) in views.iter_mut().zip(&self.buffers) {
                *view = &buffer[..n];
            }
            f(&views[..self.channels], n);

            done += n;
        }

        total
    }
}

/// Names of all available input devices
pub fn input_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate input devices: {}", e);
            Vec::new()
        }
    }
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()));
    };

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(name.to_string()))
}

/// Input stream driving a per-block closure
pub struct InputMonitor {
    device_name: Option<String>,
    config: StreamConfig,
    max_block: usize,

    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
    frames_processed: Arc<AtomicU64>,
}

impl InputMonitor {
    /// Prepare a monitor on the named device, or the default input
    pub fn new(device_name: Option<&str>, sample_rate: Option<u32>) -> Result<Self, AudioError> {
        let device = find_input_device(device_name)?;
        let default_config = device
            .default_input_config()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

        if default_config.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?}, only f32 input is supported",
                default_config.sample_format()
            )));
        }

        let mut config = default_config.config();
        if let Some(rate) = sample_rate {
            config.sample_rate = cpal::SampleRate(rate);
        }

        tracing::info!(
            "Input device {}: {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device_name: device_name.map(str::to_string),
            config,
            max_block: DEFAULT_MAX_BLOCK,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            error_rx: None,
            frames_processed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Start the stream, calling `on_block(inputs, n_frames)` from the audio
    /// callback
    pub fn start<F>(&mut self, mut on_block: F) -> Result<(), AudioError>
    where
        F: FnMut(&[&[f32]], usize) + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = find_input_device(self.device_name.as_deref())?;
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let frames_processed = self.frames_processed.clone();
        let config = self.config.clone();
        let mut deinterleaver = Deinterleaver::new(config.channels as usize, self.max_block);

        self.frames_processed.store(0, Ordering::SeqCst);
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("telemetry-input".to_string())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running.load(Ordering::Relaxed) {
                            return;
                        }

                        let frames = deinterleaver.process(data, &mut on_block);
                        frames_processed.fetch_add(frames as u64, Ordering::Relaxed);
                    },
                    move |err| {
                        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            tracing::error!("Failed to start input stream: {}", e);
                            running_for_loop.store(false, Ordering::SeqCst);
                            return;
                        }

                        // Keep the stream alive while running
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to build input stream: {}", e);
                        running_for_loop.store(false, Ordering::SeqCst);
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Frames handed to the block closure since the last start
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Next pending stream error, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for InputMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_stereo() {
        let mut splitter = Deinterleaver::new(2, 16);
        let data = [1.0f32, -1.0, 2.0, -2.0, 3.0, -3.0];

        let mut seen = Vec::new();
        let frames = splitter.process(&data, |inputs, n| {
            assert_eq!(inputs.len(), 2);
            seen.push((inputs[0][..n].to_vec(), inputs[1][..n].to_vec()));
        });

        assert_eq!(frames, 3);
        assert_eq!(seen, vec![(vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0])]);
    }

    #[test]
    fn test_long_blocks_split_into_pieces() {
        let mut splitter = Deinterleaver::new(1, 4);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();

        let mut sizes = Vec::new();
        let mut joined = Vec::new();
        splitter.process(&data, |inputs, n| {
            sizes.push(n);
            joined.extend_from_slice(&inputs[0][..n]);
        });

        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(joined, data);
    }

    #[test]
    fn test_extra_channels_dropped() {
        let mut splitter = Deinterleaver::new(MAX_INPUT_CHANNELS + 2, 8);
        assert_eq!(splitter.channels(), MAX_INPUT_CHANNELS);

        let data = vec![0.5f32; (MAX_INPUT_CHANNELS + 2) * 3];
        let mut calls = 0;
        let frames = splitter.process(&data, |inputs, n| {
            assert_eq!(inputs.len(), MAX_INPUT_CHANNELS);
            assert_eq!(n, 3);
            calls += 1;
        });
        assert_eq!((frames, calls), (3, 1));
    }

    #[test]
    fn test_device_enumeration_does_not_panic() {
        // May be empty on machines without audio hardware
        let _ = input_device_names();
    }
}
