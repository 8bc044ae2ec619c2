//! # Musical Tuning Module
//!
//! This module maps frequencies onto 12-tone equal temperament and back.
//! The reference is A4 = 440 Hz = MIDI note 69.
//!
//! ## Features
//! - Frequency to note index, octave and cents deviation
//! - Reference frequency of a (note index, octave) pair
//! - Note name parsing with sharps and flats ("A4", "C#3", "Db3")

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::TuningError;

/// Frequency of the reference pitch A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI_NOTE: i32 = 69;

/// Pitch class names, indexed by note index (0 = C).
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch class spellings accepted by [`parse_note_name`].
static PITCH_CLASSES: Lazy<BTreeMap<&'static str, u8>> = Lazy::new(|| {
    let flats = [("Db", 1), ("Eb", 3), ("Gb", 6), ("Ab", 8), ("Bb", 10)];
    NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i as u8))
        .chain(flats)
        .collect()
});

/// Nearest equal-tempered note of a detected frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoteLabel {
    /// Pitch class, 0 = C ... 11 = B.
    pub note_index: u8,
    /// Scientific pitch notation octave (A4 is octave 4).
    pub octave: i32,
    /// Signed deviation from the note, in `[-50, 50)`.
    pub cents: i32,
}

impl NoteLabel {
    /// Pitch class name without the octave, e.g. `"C#"`.
    pub fn name(&self) -> &'static str {
        NOTE_NAMES[self.note_index as usize]
    }

    pub fn midi_note(&self) -> i32 {
        (self.octave + 1) * 12 + self.note_index as i32
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}

/// Maps a frequency to its nearest note.
///
/// # Arguments
/// * `frequency` - Frequency in Hz, must be positive and finite
///
/// # Returns
/// * `Ok(label)` - Note index, octave and cents deviation
/// * `Err(TuningError::InvalidFrequency)` - For zero, negative or non-finite input
pub fn frequency_to_note(frequency: f32) -> Result<NoteLabel, TuningError> {
    if !(frequency > 0.0) || !frequency.is_finite() {
        return Err(TuningError::InvalidFrequency { frequency });
    }

    let semitone_offset = 12.0 * (frequency as f64 / A4_FREQUENCY).log2();
    let exact_semitones = A4_MIDI_NOTE as f64 + semitone_offset;

    // Round half up.
    let mut midi_note = (exact_semitones + 0.5).floor() as i32;
    let mut cents = ((exact_semitones - midi_note as f64) * 100.0 + 0.5).floor() as i32;

    // A deviation that rounds to +50 belongs to the next note at -50.
    if cents >= 50 {
        midi_note += 1;
        cents -= 100;
    }

    Ok(NoteLabel {
        note_index: midi_note.rem_euclid(12) as u8,
        octave: midi_note.div_euclid(12) - 1,
        cents,
    })
}

/// Equal-tempered frequency of a note.
///
/// # Arguments
/// * `note_index` - Pitch class, 0 = C ... 11 = B
/// * `octave` - Scientific pitch notation octave
pub fn reference_frequency(note_index: u8, octave: i32) -> Result<f32, TuningError> {
    if note_index >= 12 {
        return Err(TuningError::InvalidNoteIndex { index: note_index });
    }
    let midi_note = (octave + 1) * 12 + note_index as i32;
    let semitone_offset = (midi_note - A4_MIDI_NOTE) as f64;
    Ok((A4_FREQUENCY * 2.0_f64.powf(semitone_offset / 12.0)) as f32)
}

/// Parses a note name such as `"A4"`, `"C#3"`, `"Db3"` or `"C-1"`.
///
/// # Returns
/// * `(note_index, octave)`
pub fn parse_note_name(name: &str) -> Result<(u8, i32), TuningError> {
    let unknown = || TuningError::UnknownNoteName(name.to_string());
    let trimmed = name.trim();

    let split = trimmed
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(i, _)| i)
        .ok_or_else(unknown)?;
    let (pitch_class, octave) = trimmed.split_at(split);

    let mut chars = pitch_class.chars();
    let letter = chars.next().ok_or_else(unknown)?.to_ascii_uppercase();
    let spelled: String = std::iter::once(letter).chain(chars).collect();

    let note_index = *PITCH_CLASSES.get(spelled.as_str()).ok_or_else(unknown)?;
    let octave = octave.parse::<i32>().map_err(|_| unknown())?;
    Ok((note_index, octave))
}
