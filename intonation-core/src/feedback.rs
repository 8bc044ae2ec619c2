//! # Feedback Module
//!
//! Turns live detections into tuner feedback: deviation from a target note,
//! needle position, accuracy and a rolling accuracy score.

use std::collections::VecDeque;

use crate::error::TuningError;
use crate::monitor::Detection;
use crate::tuning::reference_frequency;

/// Number of recent accuracies averaged into the score.
pub const ACCURACY_HISTORY_LEN: usize = 10;

/// Octave used when looking up the target frequency of a fixed reference note.
pub const REFERENCE_OCTAVE: i32 = 4;

/// How the target note is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// Lock onto the first detected note.
    #[default]
    Auto,
    /// Always compare against this note index (0 = C ... 11 = B).
    Fixed(u8),
}

/// Verbal grading of the rolling accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackGrade {
    Excellent,
    Good,
    SlightlySharp,
    SlightlyFlat,
    VerySharp,
    VeryFlat,
}

impl FeedbackGrade {
    fn from_score(average_accuracy: f32, deviation_cents: i32) -> Self {
        let sharp = deviation_cents > 0;
        match average_accuracy {
            a if a >= 90.0 => FeedbackGrade::Excellent,
            a if a >= 70.0 => FeedbackGrade::Good,
            a if a >= 50.0 && sharp => FeedbackGrade::SlightlySharp,
            a if a >= 50.0 => FeedbackGrade::SlightlyFlat,
            _ if sharp => FeedbackGrade::VerySharp,
            _ => FeedbackGrade::VeryFlat,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FeedbackGrade::Excellent => "Excellent, right on pitch",
            FeedbackGrade::Good => "Good intonation",
            FeedbackGrade::SlightlySharp => "Slightly sharp, bring it down a little",
            FeedbackGrade::SlightlyFlat => "Slightly flat, bring it up a little",
            FeedbackGrade::VerySharp => "Clearly sharp, bring it down",
            FeedbackGrade::VeryFlat => "Clearly flat, bring it up",
        }
    }
}

/// Feedback for one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningFeedback {
    /// Note index compared against.
    pub target_note_index: u8,
    /// Signed deviation from the target, within (-600, 600] cents.
    pub deviation_cents: i32,
    /// Needle position in percent, 50 = in tune, clamped to [0, 100].
    pub needle_position: f32,
    /// Accuracy of this detection in percent.
    pub accuracy: f32,
    /// Mean accuracy over the recent history.
    pub average_accuracy: f32,
    pub grade: FeedbackGrade,
}

/// Rolling accuracy tracker fed by the live monitor's detections.
#[derive(Debug, Clone)]
pub struct AccuracyTracker {
    mode: ReferenceMode,
    locked_note: Option<u8>,
    history: VecDeque<f32>,
}

impl AccuracyTracker {
    pub fn new(mode: ReferenceMode) -> Self {
        Self {
            mode,
            locked_note: None,
            history: VecDeque::with_capacity(ACCURACY_HISTORY_LEN),
        }
    }

    pub fn mode(&self) -> ReferenceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ReferenceMode) {
        self.mode = mode;
    }

    /// Frequency of the fixed reference note in octave 4, if any.
    pub fn target_frequency(&self) -> Result<Option<f32>, TuningError> {
        match self.mode {
            ReferenceMode::Auto => Ok(None),
            ReferenceMode::Fixed(index) => reference_frequency(index, REFERENCE_OCTAVE).map(Some),
        }
    }

    /// Forgets the history and the auto-mode lock.
    pub fn reset(&mut self) {
        self.history.clear();
        self.locked_note = None;
    }

    pub fn observe(&mut self, detection: &Detection) -> TuningFeedback {
        let note_index = detection.label.note_index;
        let cents = detection.label.cents;

        let target = match self.mode {
            ReferenceMode::Fixed(index) => index,
            ReferenceMode::Auto => match self.locked_note {
                Some(locked) if cents.abs() <= 50 => locked,
                _ => {
                    self.locked_note = Some(note_index);
                    note_index
                }
            },
        };

        let deviation_cents = semitone_deviation(note_index, target, cents);
        let needle_position = (deviation_cents as f32 + 50.0).clamp(0.0, 100.0);
        let accuracy = (100.0 - deviation_cents.abs() as f32 * 2.0).max(0.0);

        self.history.push_back(accuracy);
        if self.history.len() > ACCURACY_HISTORY_LEN {
            self.history.pop_front();
        }
        let average_accuracy = self.history.iter().sum::<f32>() / self.history.len() as f32;

        TuningFeedback {
            target_note_index: target,
            deviation_cents,
            needle_position,
            accuracy,
            average_accuracy,
            grade: FeedbackGrade::from_score(average_accuracy, deviation_cents),
        }
    }
}

impl Default for AccuracyTracker {
    fn default() -> Self {
        Self::new(ReferenceMode::Auto)
    }
}

/// Deviation in cents of a detected note from a target pitch class, folded
/// into (-600, 600].
fn semitone_deviation(note_index: u8, target: u8, cents: i32) -> i32 {
    if note_index == target {
        return cents;
    }
    let semitones = (note_index as i32 - target as i32).rem_euclid(12);
    let deviation = semitones * 100 + cents;
    if deviation > 600 { deviation - 1200 } else { deviation }
}
