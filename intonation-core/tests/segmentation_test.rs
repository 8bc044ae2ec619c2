//! End-to-end segmentation of synthesized recordings.

use intonation_core::audio::DecodeSource;
use intonation_core::{AnalyzerConfig, SampleBuffer, SegmentAnalyzer, SourceError};
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

fn tone(freq: f32, seconds: f64) -> Vec<f32> {
    let len = (seconds * SAMPLE_RATE as f64).round() as usize;
    (0..len)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn silence(seconds: f64) -> Vec<f32> {
    vec![0.0; (seconds * SAMPLE_RATE as f64).round() as usize]
}

/// `count` loud 50 ms segments, each a single click with no pitch.
fn clicks(count: usize) -> Vec<f32> {
    let segment = (0.05 * SAMPLE_RATE as f64).round() as usize;
    let mut samples = vec![0.0; segment * count];
    for i in 0..count {
        samples[i * segment + segment / 2] = 0.9;
    }
    samples
}

fn a4_rest_a5() -> SampleBuffer {
    let samples = [tone(440.0, 0.3), silence(0.2), tone(880.0, 0.3)].concat();
    SampleBuffer::new(samples, SAMPLE_RATE)
}

#[test]
fn test_two_tones_separated_by_rest() {
    let events = SegmentAnalyzer::default().analyze(&a4_rest_a5());

    assert_eq!(events.len(), 2, "events: {events:?}");

    let first = &events[0];
    assert_eq!(first.label.note_index, 9);
    assert_eq!(first.label.octave, 4);
    assert_eq!(first.start_time, 0.0);
    assert!((first.duration - 0.3).abs() < 1e-6, "duration {}", first.duration);

    let second = &events[1];
    assert_eq!(second.label.note_index, 9);
    assert_eq!(second.label.octave, 5);
    assert!((second.start_time - 0.5).abs() < 1e-6);
    assert!((second.duration - 0.3).abs() < 1e-6, "duration {}", second.duration);

    assert!(first.end_time() < second.start_time, "notes must be separated by a gap");
}

#[test]
fn test_events_are_ordered_and_long_enough() {
    let samples = [
        tone(262.0, 0.25),
        tone(330.0, 0.05),
        tone(392.0, 0.4),
        silence(0.3),
        tone(523.0, 0.15),
        silence(0.05),
    ]
    .concat();
    let events = SegmentAnalyzer::default().analyze(&SampleBuffer::new(samples, SAMPLE_RATE));

    assert!(!events.is_empty());
    for event in &events {
        assert!(event.start_time >= 0.0);
        assert!(event.duration >= 0.1 - 1e-9, "short event {event:?}");
    }
    for pair in events.windows(2) {
        assert!(pair[0].start_time < pair[1].start_time);
        assert!(pair[0].end_time() <= pair[1].start_time + 1e-9);
    }
    // The 50 ms E4 never reaches the minimum duration
    assert!(events.iter().all(|e| e.label.to_string() != "E4"));
}

#[test]
fn test_pitchless_segments_neither_close_nor_extend() {
    let samples = [tone(440.0, 0.2), clicks(4), tone(440.0, 0.2)].concat();
    let events = SegmentAnalyzer::default().analyze(&SampleBuffer::new(samples, SAMPLE_RATE));

    assert_eq!(events.len(), 1, "events: {events:?}");
    assert_eq!(events[0].label.to_string(), "A4");
    assert_eq!(events[0].start_time, 0.0);
    assert!((events[0].duration - 0.6).abs() < 1e-6, "duration {}", events[0].duration);
}

#[test]
fn test_pitchless_segment_resets_silence_run() {
    // Two silent segments, a click, two more: never three in a row.
    let interrupted = [tone(440.0, 0.2), silence(0.1), clicks(1), silence(0.1), tone(440.0, 0.2)].concat();
    let events = SegmentAnalyzer::default().analyze(&SampleBuffer::new(interrupted, SAMPLE_RATE));
    assert_eq!(events.len(), 1, "events: {events:?}");
    assert!((events[0].duration - 0.65).abs() < 1e-6, "duration {}", events[0].duration);

    // The same gap filled with silence closes the first note.
    let silent = [tone(440.0, 0.2), silence(0.25), tone(440.0, 0.2)].concat();
    let events = SegmentAnalyzer::default().analyze(&SampleBuffer::new(silent, SAMPLE_RATE));
    assert_eq!(events.len(), 2, "events: {events:?}");
}

#[test]
fn test_custom_tolerance_merges_notes() {
    let samples = [tone(440.0, 0.2), tone(466.16, 0.2)].concat();
    let buffer = SampleBuffer::new(samples, SAMPLE_RATE);

    let strict = SegmentAnalyzer::default().analyze(&buffer);
    assert_eq!(strict.len(), 2);

    let loose = SegmentAnalyzer::new(AnalyzerConfig {
        pitch_tolerance_hz: 50.0,
        ..AnalyzerConfig::default()
    })
    .analyze(&buffer);
    assert_eq!(loose.len(), 1);
    assert_eq!(loose[0].label.to_string(), "A4");
}

#[test]
fn test_background_analysis_matches_foreground() {
    let analyzer = SegmentAnalyzer::default();
    let buffer = a4_rest_a5();
    let expected = analyzer.analyze(&buffer);

    let result = analyzer.analyze_in_background(buffer);
    let events = result
        .recv_timeout(Duration::from_secs(30))
        .expect("background analysis should finish");
    assert_eq!(events, expected);
}

struct StaticDecoder(Option<SampleBuffer>);

impl DecodeSource for StaticDecoder {
    fn decode(&mut self) -> Result<SampleBuffer, SourceError> {
        self.0
            .take()
            .ok_or_else(|| SourceError::Decode("corrupt data".into()))
    }
}

#[test]
fn test_analyze_source_propagates_decode_failure() {
    let analyzer = SegmentAnalyzer::default();

    let mut decoder = StaticDecoder(Some(a4_rest_a5()));
    assert_eq!(analyzer.analyze_source(&mut decoder).unwrap().len(), 2);

    // The buffer was consumed, so the second decode fails.
    let err = analyzer.analyze_source(&mut decoder).unwrap_err();
    assert!(matches!(err, SourceError::Decode(ref msg) if msg == "corrupt data"));
}
