// intonation-core/src/lib.rs

//! The core logic for the intonation monitor.
//! This crate is responsible for pitch estimation, note mapping,
//! live frame monitoring and note segmentation of recorded tracks.
//! It is completely headless and contains no UI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod feedback;
pub mod fft;
pub mod monitor;
pub mod pitch;
pub mod segmentation;
pub mod tuning;

pub use config::{AnalyzerConfig, Config, MonitorConfig};
pub use error::{ConfigError, SourceError, TuningError};
pub use pitch::{PitchResult, detect_pitch, rms_volume};
pub use segmentation::{NoteEvent, SegmentAnalyzer};
pub use tuning::{NoteLabel, frequency_to_note, reference_frequency};

/// A fully buffered, single channel recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Samples on a [-1, 1] scale.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the recording in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
