//! Haar wavelet scale-energy analysis
//!
//! Each level halves the signal into pairwise averages and differences
//! (scaled by 1/sqrt 2). Level energies are normalised into shares of the
//! total; levels sitting close to the mean share hint at scale invariance.

use serde::Serialize;
use std::f64::consts::FRAC_1_SQRT_2;

/// Detail coefficients per level, then the final approximation.
fn haar_dwt(x: &[f64]) -> Vec<Vec<f64>> {
    let mut levels = Vec::new();
    let mut s = x.to_vec();
    while s.len() >= 2 {
        let (approx, detail): (Vec<f64>, Vec<f64>) = s
            .chunks_exact(2)
            .map(|p| ((p[0] + p[1]) * FRAC_1_SQRT_2, (p[0] - p[1]) * FRAC_1_SQRT_2))
            .unzip();
        levels.push(detail);
        s = approx;
        if s.len() == 1 {
            levels.push(s.clone());
            break;
        }
    }
    levels
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScaleEnergy {
    /// Mean squared coefficient per level.
    pub energies: Vec<f64>,
    /// Each level's share of the summed energy.
    pub coherence: Vec<f64>,
    pub levels: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalePattern {
    /// 1-based level index.
    pub level: usize,
    pub score: f64,
}

pub fn wavelet_coherence(series: &[f64]) -> ScaleEnergy {
    let levels = haar_dwt(series);
    let energies: Vec<f64> = levels
        .iter()
        .map(|lvl| lvl.iter().map(|v| v * v).sum::<f64>() / lvl.len().max(1) as f64)
        .collect();
    let total = energies.iter().sum::<f64>();
    let total = if total == 0.0 { 1e-12 } else { total };
    let coherence = energies.iter().map(|e| e / total).collect();
    ScaleEnergy {
        levels: levels.len(),
        energies,
        coherence,
    }
}

/// Levels whose energy share lies within 0.05 of the mean share.
pub fn detect_scale_invariant_levels(series: &[f64]) -> Vec<ScalePattern> {
    let m = wavelet_coherence(series);
    if m.coherence.is_empty() {
        return Vec::new();
    }
    let avg = m.coherence.iter().sum::<f64>() / m.coherence.len() as f64;
    m.coherence
        .iter()
        .enumerate()
        .filter(|(_, c)| (*c - avg).abs() < 0.05)
        .map(|(i, c)| ScalePattern {
            level: i + 1,
            score: (c * 10_000.0).round() / 10_000.0,
        })
        .collect()
}
