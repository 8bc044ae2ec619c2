//! # Fast Fourier Transform (FFT) Module
//!
//! This module provides the windowing and autocorrelation primitives used by
//! the pitch estimator.
//!
//! ## Features
//! - Hann windowing for reduced edge discontinuities
//! - Linear (non-circular) autocorrelation via the Wiener-Khinchin theorem
//! - Direct O(N²) autocorrelation as a reference implementation

use rustfft::{FftPlanner, num_complex::Complex};

/// Applies a Hann window to the input buffer.
///
/// Uses `w[i] = 0.5 * (1 - cos(2πi / N))`, i.e. the periodic form with `N`
/// in the denominator.
///
/// # Arguments
/// * `buffer` - Audio buffer to window (modified in-place)
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n == 0 {
        return;
    }
    let n = n as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n).cos());
        *sample *= multiplier;
    }
}

/// Computes `corr[lag] = Σ s[i]·s[i+lag]` for `lag = 0..N` using an FFT.
///
/// The signal is zero-padded to at least `2N` so the circular correlation
/// computed in the frequency domain equals the linear one.
///
/// # Arguments
/// * `signal` - Input signal (already windowed)
///
/// # Returns
/// * `Vec<f32>` - Autocorrelation of the same length as `signal`
pub fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let fft_len = (2 * n).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(fft_len)
        .collect();

    forward.process(&mut buffer);
    for bin in buffer.iter_mut() {
        // Power spectrum: X · conj(X)
        *bin = Complex {
            re: bin.norm_sqr(),
            im: 0.0,
        };
    }
    inverse.process(&mut buffer);

    // RustFFT does not normalize the inverse transform.
    let scale = 1.0 / fft_len as f32;
    buffer.iter().take(n).map(|c| c.re * scale).collect()
}

/// Direct summation form of [`autocorrelate`].
pub fn autocorrelate_direct(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    (0..n)
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_tapers_start_and_peaks_in_middle() {
        let mut buffer = vec![1.0_f32; 8];
        apply_hann_window(&mut buffer);
        assert_eq!(buffer[0], 0.0);
        assert!((buffer[4] - 1.0).abs() < 1e-6);
        assert!((buffer[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fft_autocorrelation_matches_direct_sum() {
        let signal: Vec<f32> = (0..300)
            .map(|i| (i as f32 * 0.37).sin() + 0.25 * (i as f32 * 1.3).cos())
            .collect();
        let fast = autocorrelate(&signal);
        let slow = autocorrelate_direct(&signal);
        assert_eq!(fast.len(), slow.len());
        let scale = slow[0].abs();
        for (lag, (f, s)) in fast.iter().zip(&slow).enumerate() {
            assert!(
                (f - s).abs() <= 1e-3 * scale,
                "lag {lag}: fft {f} vs direct {s}"
            );
        }
    }

    #[test]
    fn empty_signal_has_empty_autocorrelation() {
        assert!(autocorrelate(&[]).is_empty());
        assert!(autocorrelate_direct(&[]).is_empty());
    }
}
