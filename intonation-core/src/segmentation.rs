//! # Segmentation Module
//!
//! Turns a fully buffered recording into an ordered list of note events.
//!
//! The recording is cut into fixed-duration segments (50 ms by default). Each
//! loud segment is estimated; consecutive detections within the pitch
//! tolerance of the note's *first* frequency extend that note, a larger jump
//! starts a new one, and a run of silent segments closes it. A note keeps the
//! frequency and label it was opened with even if the pitch drifts inside the
//! tolerance.
//!
//! A trailing partial segment shorter than one segment is not analyzed.

use crossbeam_channel::Receiver;
use serde::Serialize;
use std::thread;

use crate::SampleBuffer;
use crate::audio::DecodeSource;
use crate::config::AnalyzerConfig;
use crate::error::SourceError;
use crate::pitch::{PitchResult, detect_pitch_with_limit, rms_volume};
use crate::tuning::{NoteLabel, frequency_to_note};

/// Absorbs floating point error in segment timestamps when applying the
/// minimum duration.
const DURATION_EPSILON: f64 = 1e-9;

/// A finalized note of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteEvent {
    /// Frequency first detected for this note, in Hz.
    pub frequency: f32,
    #[serde(flatten)]
    pub label: NoteLabel,
    /// Seconds from the start of the recording.
    pub start_time: f64,
    /// Seconds, never below the configured minimum.
    pub duration: f64,
}

impl NoteEvent {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// The note currently being accumulated.
#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    frequency: f32,
    label: NoteLabel,
    start_time: f64,
    /// End of the last segment that confirmed this note.
    sounding_until: f64,
}

/// Batch note segmentation.
#[derive(Debug, Clone, Default)]
pub struct SegmentAnalyzer {
    config: AnalyzerConfig,
}

impl SegmentAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Segments `buffer` into chronological, non-overlapping note events.
    pub fn analyze(&self, buffer: &SampleBuffer) -> Vec<NoteEvent> {
        let config = &self.config;
        let segment_duration = config.segment_duration;
        let samples_per_segment = (segment_duration * buffer.sample_rate as f64).floor() as usize;
        if samples_per_segment == 0 {
            tracing::warn!(
                "[SEGMENT] Segment of {}s at {} Hz holds no samples",
                segment_duration,
                buffer.sample_rate
            );
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut active: Option<ActiveNote> = None;
        let mut silent_run = 0u32;

        let segments = buffer.samples.chunks_exact(samples_per_segment);
        let total_segments = segments.len();

        for (i, segment) in segments.enumerate() {
            let time = i as f64 * segment_duration;

            if rms_volume(segment) < config.volume_threshold {
                silent_run += 1;
                if silent_run >= config.silence_segments {
                    if let Some(note) = active.take() {
                        self.close(note, &mut events);
                    }
                }
                continue;
            }

            silent_run = 0;
            let frequency = match detect_pitch_with_limit(
                segment,
                buffer.sample_rate,
                config.max_detectable_frequency,
            ) {
                PitchResult::Detected(frequency) => frequency,
                // A gap: neither closes nor extends the active note.
                PitchResult::Undetected => continue,
            };

            // Same note: extend it, keeping its original frequency and label.
            if let Some(note) = active
                .as_mut()
                .filter(|note| (note.frequency - frequency).abs() <= config.pitch_tolerance_hz)
            {
                note.sounding_until = time + segment_duration;
                continue;
            }

            if let Some(note) = active.take() {
                self.close(note, &mut events);
            }
            let label = match frequency_to_note(frequency) {
                Ok(label) => label,
                Err(err) => {
                    tracing::error!("[SEGMENT] {}", err);
                    continue;
                }
            };
            tracing::debug!("[SEGMENT] {:.3}s: opened {} at {:.1} Hz", time, label, frequency);
            active = Some(ActiveNote {
                frequency,
                label,
                start_time: time,
                sounding_until: time + segment_duration,
            });
        }

        if let Some(note) = active.take() {
            self.close(note, &mut events);
        }

        tracing::info!(
            "[SEGMENT] Analyzed {} segments ({:.2}s), found {} notes",
            total_segments,
            total_segments as f64 * segment_duration,
            events.len()
        );
        events
    }

    /// Decodes a recording from `source` and analyzes it.
    pub fn analyze_source(&self, source: &mut dyn DecodeSource) -> Result<Vec<NoteEvent>, SourceError> {
        let buffer = source.decode()?;
        Ok(self.analyze(&buffer))
    }

    /// Runs [`analyze`](Self::analyze) on a worker thread.
    ///
    /// The result arrives on the returned channel exactly once.
    pub fn analyze_in_background(&self, buffer: SampleBuffer) -> Receiver<Vec<NoteEvent>> {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let analyzer = self.clone();
        thread::spawn(move || {
            let events = analyzer.analyze(&buffer);
            let _ = result_tx.send(events);
        });
        result_rx
    }

    /// Emits `note` if it lasted at least the minimum duration.
    fn close(&self, note: ActiveNote, events: &mut Vec<NoteEvent>) {
        let duration = note.sounding_until - note.start_time;
        if duration + DURATION_EPSILON < self.config.min_note_duration {
            tracing::debug!(
                "[SEGMENT] {:.3}s: dropped {} after {:.3}s",
                note.start_time,
                note.label,
                duration
            );
            return;
        }

        events.push(NoteEvent {
            frequency: note.frequency,
            label: note.label,
            start_time: note.start_time,
            duration,
        });
    }
}
