//! Beta-Bernoulli update: a sample above the window mean counts as a success.

use super::mean;
use maat_core::BetaPrior;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BayesUpdate {
    pub successes: usize,
    pub failures: usize,
    pub a: f64,
    pub b: f64,
    pub mean: f64,
}

pub fn bayesian_update(series: &[f64], prior: &BetaPrior) -> BayesUpdate {
    if series.is_empty() {
        return BayesUpdate {
            successes: 0,
            failures: 0,
            a: prior.a,
            b: prior.b,
            mean: prior.mean(),
        };
    }

    let mu = mean(series);
    let successes = series.iter().filter(|&&x| x > mu).count();
    let failures = series.len() - successes;
    let a = prior.a + successes as f64;
    let b = prior.b + failures as f64;

    BayesUpdate {
        successes,
        failures,
        a,
        b,
        mean: a / (a + b),
    }
}
