//! Error types for the intonation core.
//!
//! An undetected pitch is not an error; it is reported through
//! [`crate::PitchResult::Undetected`]. Everything here is a condition the
//! caller has to see.

use thiserror::Error;

/// Errors raised by the note mapper.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TuningError {
    /// The mapper only accepts positive, finite frequencies.
    #[error("invalid frequency: {frequency} Hz")]
    InvalidFrequency {
        /// The rejected frequency.
        frequency: f32,
    },

    /// Note indices run from 0 (C) to 11 (B).
    #[error("invalid note index: {index} (expected 0-11)")]
    InvalidNoteIndex {
        /// The rejected index.
        index: u8,
    },

    /// The note name could not be parsed.
    #[error("unknown note name: {0:?}")]
    UnknownNoteName(String),
}

/// Terminal failures of an audio source. These are never retried.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The capture stream could not be started (device busy, permission denied...).
    #[error("failed to start audio capture: {0}")]
    CaptureStart(String),

    /// The frame stream ended while the monitor was still running.
    #[error("audio stream closed unexpectedly")]
    StreamClosed,

    /// The recording could not be decoded.
    #[error("failed to decode audio: {0}")]
    Decode(String),
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
