//! Numeric kernels. Pure functions; short or empty input yields fixed fallbacks.

pub mod bayes;
pub mod coherence;
pub mod mdl;
pub mod multiscale;

pub use bayes::{bayesian_update, BayesUpdate};
pub use coherence::fft_peak_mean;
pub use mdl::{linear_fit_residuals, mdl_delta_bits, residual_stats};
pub use multiscale::{detect_scale_invariant_levels, wavelet_coherence, ScaleEnergy, ScalePattern};

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
