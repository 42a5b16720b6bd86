//! End-to-end: audio thread producing, UI thread draining through the
//! registry into a channel dispatcher

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use audio_telemetry::sender::{
    PeakSender, PeakSettings, SpectrumOutput, SpectrumSender, SpectrumSettings, ToDecibels,
};
use audio_telemetry::{ChannelDispatcher, MessageKind, Packet, Tag, TransmitterRegistry};

const BLOCK: usize = 128;

/// Drain `registry` until `finished` is set and nothing is left
fn run_ui(
    registry: &mut TransmitterRegistry,
    dispatcher: &mut ChannelDispatcher,
    finished: &AtomicBool,
) {
    loop {
        let done = finished.load(Ordering::Acquire);
        registry.transmit_all(dispatcher);
        if done && registry.pending() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_peak_packets_arrive_in_order() {
    let total = 96_000;
    let window = 64;
    let settings = PeakSettings {
        window,
        threshold: 0.0,
    };
    let (mut sender, rx) = PeakSender::<2>::new(Tag(10), 32, settings).unwrap();

    let mut registry = TransmitterRegistry::new();
    registry.register(rx);
    let (mut dispatcher, ui_rx) = ChannelDispatcher::new(total / window);

    let finished = Arc::new(AtomicBool::new(false));
    let audio_finished = finished.clone();
    let audio = thread::spawn(move || {
        // rising ramp: every window mean is larger than the previous one
        let ramp: Vec<f32> = (0..total).map(|i| i as f32 / total as f32).collect();
        for (i, block) in ramp.chunks(BLOCK).enumerate() {
            sender.process_block(&[block, block], block.len(), 2, 0);
            if i % 16 == 0 {
                thread::yield_now();
            }
        }
        audio_finished.store(true, Ordering::Release);
    });

    run_ui(&mut registry, &mut dispatcher, &finished);
    audio.join().unwrap();

    let means: Vec<f32> = ui_rx
        .try_iter()
        .map(|msg| {
            assert_eq!(msg.tag, Tag(10));
            assert_eq!(msg.kind, MessageKind::Update);
            let packet = Packet::<f32, 2>::decode(&msg.payload).unwrap();
            assert_eq!(packet.values[0], packet.values[1]);
            packet.values[0]
        })
        .collect();

    assert_eq!(dispatcher.dropped(), 0);
    assert_eq!(means.len() + registry.overflow_total(), total / window);
    assert!(means.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_spectrum_through_registry() {
    let fft_size = 1024;
    let settings = SpectrumSettings {
        fft_size,
        overlap: 2,
        output: SpectrumOutput::Magnitude,
        threshold: 0.0,
        ..SpectrumSettings::default()
    };
    let (mut sender, rx) =
        SpectrumSender::<1, 1024>::with_prepare(Tag(20), 64, settings, ToDecibels::default())
            .unwrap();

    let mut registry = TransmitterRegistry::new();
    registry.register(rx);
    let (mut dispatcher, ui_rx) = ChannelDispatcher::new(256);

    let finished = Arc::new(AtomicBool::new(false));
    let audio_finished = finished.clone();
    let audio = thread::spawn(move || {
        let tone: Vec<f32> = (0..fft_size * 8)
            .map(|i| 0.5 * (2.0 * PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect();
        for block in tone.chunks(BLOCK) {
            sender.process_block(&[block], block.len(), 1, 0);
        }
        audio_finished.store(true, Ordering::Release);
        sender.transforms_completed()
    });

    run_ui(&mut registry, &mut dispatcher, &finished);
    let transforms = audio.join().unwrap();
    assert_eq!(transforms, 16);

    let messages: Vec<_> = ui_rx.try_iter().collect();
    assert_eq!(messages.len() + registry.overflow_total(), 16);

    let last = messages.last().unwrap();
    let packet = Packet::<[f32; 1024], 1>::decode(&last.payload).unwrap();
    let bins = &packet.values[0][..=fft_size / 2];
    let (peak_bin, peak_db) = bins
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();

    // 1 kHz at 48 kHz over 1024 points sits at bin 21.3
    assert!((20..=22).contains(&peak_bin), "peak at bin {}", peak_bin);
    // density scaling: a 0.5 sine over 1024 Hann points lands near +19 dB
    assert!(peak_db > 10.0 && peak_db < 25.0, "peak level {} dB", peak_db);
    assert!(bins.iter().all(|&db| db >= -120.0));
}
