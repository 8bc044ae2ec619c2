//! # Configuration Module
//!
//! Tunable parameters for the live monitor and the segmentation analyzer.
//! Every field has a default, so a JSON file only needs to list the values
//! it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Frame size delivered to the live monitor per tick.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// RMS level below which a frame or segment is treated as silence.
pub const DEFAULT_VOLUME_THRESHOLD: f32 = 0.01;

/// Highest frequency the estimator searches for. Bounds the lag search
/// away from the zero-lag peak.
pub const DEFAULT_MAX_DETECTABLE_FREQUENCY: f32 = 1500.0;

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub analyzer: AnalyzerConfig,
}

/// Live monitor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Number of samples per frame.
    pub frame_size: usize,
    pub volume_threshold: f32,
    pub max_detectable_frequency: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            max_detectable_frequency: DEFAULT_MAX_DETECTABLE_FREQUENCY,
        }
    }
}

/// Segmentation analyzer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Segment length in seconds.
    pub segment_duration: f64,
    pub volume_threshold: f32,
    pub max_detectable_frequency: f32,
    /// Consecutive silent segments that close the active note.
    pub silence_segments: u32,
    /// A detection further than this from the active note's frequency starts a new note.
    pub pitch_tolerance_hz: f32,
    /// Notes shorter than this (seconds) are dropped.
    pub min_note_duration: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            segment_duration: 0.05,
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            max_detectable_frequency: DEFAULT_MAX_DETECTABLE_FREQUENCY,
            silence_segments: 3,
            pitch_tolerance_hz: 5.0,
            min_note_duration: 0.1,
        }
    }
}

impl Config {
    /// Loads a JSON configuration file.
    ///
    /// Unlike a missing `--config` flag, an unreadable or malformed file is
    /// reported to the caller instead of silently falling back to defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        let config = Self::from_json(&contents)?;
        tracing::info!("[CONFIG] Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }
}
