//! Live microphone monitoring with tuner feedback on stdout.

use std::time::Duration;

use anyhow::{Context, Result};
use intonation_core::audio::CpalCapture;
use intonation_core::feedback::{AccuracyTracker, ReferenceMode};
use intonation_core::monitor::{Detection, LiveMonitor, MonitorSink};
use intonation_core::{MonitorConfig, SourceError, tuning};

/// Prints one line per detection, scored against the reference note.
struct ConsoleSink {
    tracker: AccuracyTracker,
}

impl MonitorSink for ConsoleSink {
    fn on_detection(&mut self, detection: &Detection) {
        let feedback = self.tracker.observe(detection);
        println!(
            "{:>7.1} Hz  {:<4} {:>+4} cents | target {:<2} {:>+5} cents | accuracy {:>3.0}% | {}",
            detection.frequency,
            detection.label.to_string(),
            detection.label.cents,
            tuning::NOTE_NAMES[feedback.target_note_index as usize],
            feedback.deviation_cents,
            feedback.average_accuracy,
            feedback.grade.message()
        );
    }

    fn on_waveform(&mut self, frame: &[f32]) {
        let peak = frame.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        tracing::trace!("[LISTEN] frame peak {:.3}", peak);
    }

    fn on_error(&mut self, error: &SourceError) {
        tracing::error!("[LISTEN] {}", error);
    }
}

/// Parses a reference note with or without an octave ("A", "C#4").
fn parse_reference(name: &str) -> Result<u8> {
    let (note_index, _) = tuning::parse_note_name(name)
        .or_else(|_| tuning::parse_note_name(&format!("{name}4")))
        .with_context(|| format!("invalid reference note {name:?}"))?;
    Ok(note_index)
}

pub fn run(config: MonitorConfig, seconds: Option<u64>, reference: Option<&str>) -> Result<()> {
    let mode = match reference {
        Some(name) => ReferenceMode::Fixed(parse_reference(name)?),
        None => ReferenceMode::Auto,
    };
    let tracker = AccuracyTracker::new(mode);
    if let Some(target) = tracker.target_frequency()? {
        tracing::info!("[LISTEN] Reference note {} ({:.2} Hz)", reference.unwrap_or_default(), target);
    } else {
        tracing::info!("[LISTEN] Auto-detecting the reference note");
    }

    let mut capture = CpalCapture::new(config.frame_size);
    let mut monitor = LiveMonitor::new(ConsoleSink { tracker }, config);
    let frames = monitor
        .start(&mut capture)
        .context("starting audio capture")?;

    let shutdown = match seconds {
        Some(seconds) => crossbeam_channel::after(Duration::from_secs(seconds)),
        None => crossbeam_channel::never(),
    };
    monitor.run(&frames, &shutdown);
    monitor.stop(&mut capture);
    Ok(())
}
