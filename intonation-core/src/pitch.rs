//! # Pitch Detection Module
//!
//! This module implements the windowed autocorrelation pitch estimator.
//! It is a pure function of its input: the caller's samples are copied
//! before windowing and no state survives between calls.
//!
//! ## Features
//! - Hann windowing before correlation
//! - FFT-based autocorrelation (Wiener-Khinchin)
//! - Lag search bounded by the highest detectable frequency
//! - Parabolic interpolation for sub-sample accuracy
//!
//! The estimator does not gate on loudness. Callers compute [`rms_volume`]
//! and skip frames below their threshold.

use std::ops::Range;

use crate::config::DEFAULT_MAX_DETECTABLE_FREQUENCY;
use crate::fft::{apply_hann_window, autocorrelate};

/// Smallest peak correlation, relative to the zero-lag energy, that counts
/// as periodicity. FFT round-off sits around 1e-8 of the energy.
const MIN_PEAK_TO_ENERGY_RATIO: f32 = 1e-6;

/// Outcome of a single pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchResult {
    /// Estimated fundamental frequency in Hz, always positive and finite.
    Detected(f32),
    /// No usable autocorrelation peak (silence, degenerate signal, empty search range).
    Undetected,
}

impl PitchResult {
    pub fn frequency(self) -> Option<f32> {
        match self {
            PitchResult::Detected(frequency) => Some(frequency),
            PitchResult::Undetected => None,
        }
    }

    pub fn is_detected(self) -> bool {
        matches!(self, PitchResult::Detected(_))
    }
}

/// Root-mean-square level of a frame: `sqrt(mean(sample²))`.
///
/// Returns 0 for an empty frame.
pub fn rms_volume(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Estimates the fundamental frequency of `signal` with the default 1500 Hz ceiling.
///
/// # Arguments
/// * `signal` - Input audio frame
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// * `PitchResult::Detected(frequency)` - Estimated frequency in Hz
/// * `PitchResult::Undetected` - No pitch could be estimated
pub fn detect_pitch(signal: &[f32], sample_rate: u32) -> PitchResult {
    detect_pitch_with_limit(signal, sample_rate, DEFAULT_MAX_DETECTABLE_FREQUENCY)
}

/// Estimates the fundamental frequency, searching lags in
/// `[floor(sample_rate / max_frequency), ceil(N / 2))`.
pub fn detect_pitch_with_limit(signal: &[f32], sample_rate: u32, max_frequency: f32) -> PitchResult {
    let frame_size = signal.len();
    if frame_size == 0 || sample_rate == 0 || !(max_frequency > 0.0) {
        return PitchResult::Undetected;
    }

    // --- Step 1: Window a private copy ---
    let mut windowed = signal.to_vec();
    apply_hann_window(&mut windowed);

    // --- Step 2: Autocorrelation ---
    let correlations = autocorrelate(&windowed);

    estimate_from_correlations(&correlations, frame_size, sample_rate, max_frequency)
}

/// Steps 3 to 6 of the estimator on an already computed autocorrelation of
/// a windowed frame of `frame_size` samples.
fn estimate_from_correlations(
    correlations: &[f32],
    frame_size: usize,
    sample_rate: u32,
    max_frequency: f32,
) -> PitchResult {
    // --- Step 3 & 4: Peak search over the bounded lag range ---
    let min_lag = (sample_rate as f32 / max_frequency).floor() as usize;
    let search = min_lag..frame_size.div_ceil(2);
    let Some(peak_lag) = find_peak_lag(correlations, search.clone()) else {
        return PitchResult::Undetected;
    };

    // --- Step 5: Parabolic interpolation ---
    let refined_lag = refine_peak_lag(correlations, peak_lag, search);

    // --- Step 6 ---
    let frequency = sample_rate as f32 / refined_lag;
    tracing::trace!(peak_lag, refined_lag, frequency, "[PITCH] Autocorrelation peak");
    if frequency.is_finite() && frequency > 0.0 {
        PitchResult::Detected(frequency)
    } else {
        PitchResult::Undetected
    }
}

/// Returns the lag with the largest correlation inside `search`.
///
/// `None` when the range is empty, when the winner is lag 0, when the frame
/// carries no energy, or when the winner does not exceed
/// [`MIN_PEAK_TO_ENERGY_RATIO`] of the zero-lag energy (silence, clicks and
/// other frames whose correlation is only FFT round-off).
fn find_peak_lag(correlations: &[f32], search: Range<usize>) -> Option<usize> {
    let energy = correlations.first().copied().unwrap_or(0.0);
    if !(energy > 0.0) {
        return None;
    }
    let threshold = energy * MIN_PEAK_TO_ENERGY_RATIO;

    let end = search.end.min(correlations.len());
    let mut best: Option<(usize, f32)> = None;
    for lag in search.start..end {
        let value = correlations[lag];
        if best.is_none_or(|(_, best_value)| value > best_value) {
            best = Some((lag, value));
        }
    }

    best.filter(|&(lag, value)| lag > 0 && value > threshold)
        .map(|(lag, _)| lag)
}

/// Refines an integer peak lag with a parabola through its two neighbours.
///
/// Falls back to the integer lag when the peak sits on either edge of the
/// searched range, when the parabola is flat, or when the vertex is unusable.
pub fn refine_peak_lag(correlations: &[f32], peak_lag: usize, search: Range<usize>) -> f32 {
    let unrefined = peak_lag as f32;
    if peak_lag <= search.start || peak_lag + 1 >= search.end || peak_lag + 1 >= correlations.len() {
        return unrefined;
    }

    let y1 = correlations[peak_lag - 1];
    let y2 = correlations[peak_lag];
    let y3 = correlations[peak_lag + 1];

    let a = (y1 + y3 - 2.0 * y2) / 2.0;
    let b = (y3 - y1) / 2.0;
    if a == 0.0 {
        return unrefined;
    }

    let refined = unrefined - b / (2.0 * a);
    if refined.is_finite() && refined > 0.0 {
        refined
    } else {
        unrefined
    }
}
