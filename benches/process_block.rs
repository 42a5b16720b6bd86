//! Audio-thread cost of each sender
//!
//! Every `process_block` call has to fit in the callback's time budget,
//! `block_size / sample_rate` (5.33 ms for 256 frames at 48 kHz), alongside
//! whatever DSP the host runs. The consumer is drained inside the loop so the
//! queue never sits on its overflow path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::f32::consts::PI;

use audio_telemetry::sender::{
    BufferSender, BufferSettings, PeakAvgSender, PeakAvgSettings, PeakSender, PeakSettings,
    SpectrumSender, SpectrumSettings,
};
use audio_telemetry::Tag;

const BLOCK_SIZES: [usize; 4] = [64, 128, 256, 512];
const FFT_SIZES: [usize; 3] = [512, 1024, 4096];

fn stereo_block(len: usize) -> (Vec<f32>, Vec<f32>) {
    let left = (0..len)
        .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 48000.0).sin())
        .collect();
    let right = (0..len)
        .map(|i| 0.25 * (2.0 * PI * 1000.0 * i as f32 / 48000.0).sin())
        .collect();
    (left, right)
}

fn bench_peak(c: &mut Criterion) {
    let mut group = c.benchmark_group("senders/peak");

    for &block in &BLOCK_SIZES {
        let (left, right) = stereo_block(block);
        let (mut sender, mut rx) =
            PeakSender::<2>::new(Tag(1), 1024, PeakSettings::default()).unwrap();

        group.throughput(Throughput::Elements(block as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &n| {
            b.iter(|| {
                sender.process_block(black_box(&[&left[..], &right[..]]), n, 2, 0);
                while rx.recv().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_peak_avg(c: &mut Criterion) {
    let mut group = c.benchmark_group("senders/peak_avg");

    for &block in &BLOCK_SIZES {
        let (left, right) = stereo_block(block);
        let (mut sender, mut rx) =
            PeakAvgSender::<2>::new(Tag(2), 1024, PeakAvgSettings::default()).unwrap();

        group.throughput(Throughput::Elements(block as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &n| {
            b.iter(|| {
                sender.process_block(black_box(&[&left[..], &right[..]]), n, 2, 0);
                while rx.recv().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("senders/buffer");

    for &block in &BLOCK_SIZES {
        let (left, right) = stereo_block(block);
        let (mut sender, mut rx) =
            BufferSender::<2, 512>::new(Tag(3), 1024, BufferSettings::default()).unwrap();

        group.throughput(Throughput::Elements(block as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &n| {
            b.iter(|| {
                sender.process_block(black_box(&[&left[..], &right[..]]), n, 2, 0);
                while rx.recv().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("senders/spectrum");
    let block = 256;
    let (left, right) = stereo_block(block);

    for &fft_size in &FFT_SIZES {
        for overlap in [1usize, 4] {
            let settings = SpectrumSettings {
                fft_size,
                overlap,
                ..SpectrumSettings::default()
            };
            let (mut sender, mut rx) =
                SpectrumSender::<2, 4096>::new(Tag(4), 64, settings).unwrap();

            group.throughput(Throughput::Elements(block as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("fft{}", fft_size), overlap),
                &overlap,
                |b, _| {
                    b.iter(|| {
                        sender.process_block(black_box(&[&left[..], &right[..]]), block, 2, 0);
                        while rx.recv().is_some() {}
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_peak, bench_peak_avg, bench_buffer, bench_spectrum);
criterion_main!(benches);
