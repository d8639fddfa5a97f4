//! Minimum description length: a linear trend model against a constant-mean null.

use super::mean;
use maat_core::ResidualStats;
use std::f64::consts::{LN_2, PI};

const SIGMA_FLOOR: f64 = 1e-12;

/// Residuals of the ordinary-least-squares line `y = a + b*t`.
pub fn linear_fit_residuals(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mean_t = (n - 1) as f64 / 2.0;
    let mean_y = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (t, y) in values.iter().enumerate() {
        let dt = t as f64 - mean_t;
        num += dt * (y - mean_y);
        den += dt * dt;
    }

    if den.abs() < 1e-12 {
        return values.iter().map(|y| y - mean_y).collect();
    }

    let b = num / den;
    let a = mean_y - b * mean_t;
    values
        .iter()
        .enumerate()
        .map(|(t, y)| y - (a + b * t as f64))
        .collect()
}

/// Gaussian code length in nats: `0.5 * n * (1 + ln(2*pi*sigma^2))`.
fn gaussian_code_length(n: usize, sigma: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    0.5 * n as f64 * (1.0 + (2.0 * PI * sigma * sigma).ln())
}

fn sample_sigma(xs: &[f64], center: f64) -> f64 {
    let n = xs.len();
    let var = xs.iter().map(|x| (x - center).powi(2)).sum::<f64>() / (n.max(2) - 1) as f64;
    if var > 0.0 {
        var.sqrt()
    } else {
        SIGMA_FLOOR
    }
}

/// `(L(data|model) + L(params)) - L(data|null)` in bits.
///
/// Negative means the linear model compresses the window better than its
/// mean. The parameter cost is the BIC-style `0.5 * params * ln(n)`.
pub fn mdl_delta_bits(values: &[f64], params: usize) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }

    let sigma_null = sample_sigma(values, mean(values));
    let resid = linear_fit_residuals(values);
    let sigma_model = sample_sigma(&resid, 0.0);

    let null_cost = gaussian_code_length(n, sigma_null);
    let model_cost = gaussian_code_length(n, sigma_model);
    let penalty = 0.5 * params as f64 * (n as f64 + 1e-12).ln();

    (model_cost + penalty - null_cost) / LN_2
}

/// RMS of the linear-fit residuals and the share lying beyond two standard deviations.
pub fn residual_stats(values: &[f64]) -> ResidualStats {
    let resid = linear_fit_residuals(values);
    if resid.is_empty() {
        return ResidualStats::default();
    }
    let n = resid.len() as f64;
    let norm = (resid.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
    if norm <= SIGMA_FLOOR {
        return ResidualStats {
            norm: 0.0,
            outlier_rate: 0.0,
        };
    }
    let outliers = resid.iter().filter(|r| r.abs() > 2.0 * norm).count();
    ResidualStats {
        norm,
        outlier_rate: outliers as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_is_zero() {
        assert_eq!(mdl_delta_bits(&[], 2), 0.0);
    }

    #[test]
    fn single_sample_is_zero() {
        // both sigmas floor, ln(1) penalty
        assert!(mdl_delta_bits(&[3.0], 2).abs() < 1e-9);
    }

    #[test]
    fn residuals_of_exact_line_vanish() {
        let xs: Vec<f64> = (0..10).map(|t| 2.0 + 0.5 * t as f64).collect();
        for r in linear_fit_residuals(&xs) {
            assert!(r.abs() < 1e-9);
        }
    }

    #[test]
    fn trend_compresses_better_than_mean() {
        let xs: Vec<f64> = (0..64)
            .map(|t| 0.1 * t as f64 + if t % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        assert!(mdl_delta_bits(&xs, 2) < -100.0);
    }

    #[test]
    fn trendless_noise_pays_the_penalty() {
        let xs: Vec<f64> = (0..32).map(|t| if t % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(mdl_delta_bits(&xs, 2) > 0.0);
    }

    #[test]
    fn residual_stats_of_line_are_zero() {
        let xs: Vec<f64> = (0..8).map(|t| t as f64).collect();
        assert_eq!(residual_stats(&xs), ResidualStats::default());
    }
}
