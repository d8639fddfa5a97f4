//! Hypothesis generators
//!
//! A generator turns one observed window into a list of claims. The engine
//! holds exactly one, chosen at construction:
//! - `StatisticalGenerator`: three deterministic claims (level, trend, periodicity)
//! - `PromptedGenerator`: claims parsed from an external `ClaimSource`
//! - `HybridGenerator`: prompted first, statistical when nothing usable comes back

use crate::mathx::{fft_peak_mean, linear_fit_residuals, mean};
use maat_core::{Hemisphere, Hypothesis, Result, Stamper};
use std::path::Path;
use tracing::debug;

/// Capability interface for hypothesis generation.
pub trait HypothesisGenerator: Send {
    fn name(&self) -> &'static str;

    fn generate(
        &mut self,
        stamper: &mut Stamper,
        obs_ids: &[String],
        series: &[f64],
        hemi: Hemisphere,
    ) -> Vec<Hypothesis>;
}

// ============================================================
// Statistical
// ============================================================

/// Mean-level, slope and periodicity claims computed from the window itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticalGenerator;

impl StatisticalGenerator {
    pub fn claims(series: &[f64]) -> [String; 3] {
        let mu = mean(series);
        let resid = linear_fit_residuals(series);
        let slope = match (resid.first(), resid.last()) {
            (Some(first), Some(last)) if resid.len() > 1 => (last - first) / resid.len() as f64,
            _ => 0.0,
        };
        let coh = fft_peak_mean(series);
        [
            format!("mean>{:.3} implies stability", mu),
            format!("slope>{:.3} implies trend", slope),
            format!("coherence>{:.2} implies periodic pattern", coh),
        ]
    }
}

impl HypothesisGenerator for StatisticalGenerator {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn generate(
        &mut self,
        stamper: &mut Stamper,
        obs_ids: &[String],
        series: &[f64],
        hemi: Hemisphere,
    ) -> Vec<Hypothesis> {
        Self::claims(series)
            .into_iter()
            .map(|claim| Hypothesis::new(stamper, claim, hemi, obs_ids, None))
            .collect()
    }
}

// ============================================================
// Prompted
// ============================================================

/// Something that answers a prompt with free-form claim text.
pub trait ClaimSource: Send {
    fn respond(&mut self, prompt: &str) -> String;
}

impl<F> ClaimSource for F
where
    F: FnMut(&str) -> String + Send,
{
    fn respond(&mut self, prompt: &str) -> String {
        self(prompt)
    }
}

/// Canned responses read from a file, one per non-blank line, served round-robin.
#[derive(Clone, Debug, Default)]
pub struct ClaimFile {
    lines: Vec<String>,
    next: usize,
}

impl ClaimFile {
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_lines(text.lines()))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { lines, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl ClaimSource for ClaimFile {
    fn respond(&mut self, _prompt: &str) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        if self.next >= self.lines.len() {
            self.next = 0;
        }
        let line = self.lines[self.next].clone();
        self.next += 1;
        line
    }
}

const LIST_MARKERS: [&str; 6] = ["- ", "* ", "• ", "1. ", "2. ", "3. "];

/// Split a response into claims: one per line, commas split further, list markers dropped.
pub fn parse_claims(text: &str) -> Vec<String> {
    let mut claims = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for part in line.split(',') {
            let mut claim = part.trim();
            for marker in LIST_MARKERS {
                if let Some(rest) = claim.strip_prefix(marker) {
                    claim = rest.trim();
                }
            }
            if !claim.is_empty() {
                claims.push(claim.to_string());
            }
        }
    }
    claims
}

/// Describes the window's summary statistics and asks for three claims.
pub fn build_prompt(series: &[f64]) -> String {
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    format!(
        "Given a time series with {} samples:\n- Mean: {:.3}\n- Min: {:.3}\n- Max: {:.3}\n\n\
         Generate 3 testable hypotheses about this data.\nFormat: one hypothesis per line.",
        series.len(),
        mean(series),
        min,
        max
    )
}

pub struct PromptedGenerator {
    source: Box<dyn ClaimSource>,
}

impl PromptedGenerator {
    pub fn new(source: impl ClaimSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl std::fmt::Debug for PromptedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptedGenerator").finish_non_exhaustive()
    }
}

impl HypothesisGenerator for PromptedGenerator {
    fn name(&self) -> &'static str {
        "prompted"
    }

    fn generate(
        &mut self,
        stamper: &mut Stamper,
        obs_ids: &[String],
        series: &[f64],
        hemi: Hemisphere,
    ) -> Vec<Hypothesis> {
        if series.is_empty() {
            return Vec::new();
        }
        let response = self.source.respond(&build_prompt(series));
        parse_claims(&response)
            .into_iter()
            .map(|claim| Hypothesis::new(stamper, claim, hemi, obs_ids, None))
            .collect()
    }
}

// ============================================================
// Hybrid
// ============================================================

#[derive(Debug, Default)]
pub struct HybridGenerator {
    prompted: Option<PromptedGenerator>,
    fallback: StatisticalGenerator,
}

impl HybridGenerator {
    pub fn new(prompted: Option<PromptedGenerator>) -> Self {
        Self {
            prompted,
            fallback: StatisticalGenerator,
        }
    }
}

impl HypothesisGenerator for HybridGenerator {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn generate(
        &mut self,
        stamper: &mut Stamper,
        obs_ids: &[String],
        series: &[f64],
        hemi: Hemisphere,
    ) -> Vec<Hypothesis> {
        if let Some(prompted) = self.prompted.as_mut() {
            let hyps = prompted.generate(stamper, obs_ids, series, hemi);
            if !hyps.is_empty() {
                return hyps;
            }
            debug!("prompted generator returned no claims, falling back");
        }
        self.fallback.generate(stamper, obs_ids, series, hemi)
    }
}
