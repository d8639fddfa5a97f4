//! Spectral coherence: peak-to-mean magnitude ratio of the one-sided DFT.

use super::mean;
use std::f64::consts::PI;

/// Ratio of the largest to the mean DFT magnitude over bins `0..=n/2` of the
/// mean-detrended series. Zero when `n < 4` or the spectrum is flat zero.
pub fn fft_peak_mean(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }

    let mu = mean(values);
    let xs: Vec<f64> = values.iter().map(|x| x - mu).collect();

    let mags: Vec<f64> = (0..=n / 2)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (t, x) in xs.iter().enumerate() {
                let angle = 2.0 * PI * (k * t) as f64 / n as f64;
                re += x * angle.cos();
                im -= x * angle.sin();
            }
            re.hypot(im)
        })
        .collect();

    let mean_mag = mean(&mags);
    if mean_mag <= 1e-12 {
        return 0.0;
    }
    mags.iter().cloned().fold(f64::MIN, f64::max) / mean_mag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_is_zero() {
        assert_eq!(fft_peak_mean(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn constant_series_is_zero() {
        assert_eq!(fft_peak_mean(&[4.0; 16]), 0.0);
    }

    #[test]
    fn pure_tone_is_highly_coherent() {
        let xs: Vec<f64> = (0..64).map(|t| (2.0 * PI * t as f64 / 16.0).sin()).collect();
        // all energy in one of 33 bins: peak / mean ~= 33
        let c = fft_peak_mean(&xs);
        assert!(c > 30.0, "coherence {c}");
    }

    #[test]
    fn alternating_series_peaks_at_nyquist() {
        let xs: Vec<f64> = (0..8).map(|t| if t % 2 == 0 { 1.0 } else { -1.0 }).collect();
        // bins 0..=4, only bin 4 non-zero
        assert!((fft_peak_mean(&xs) - 5.0).abs() < 1e-9);
    }
}
