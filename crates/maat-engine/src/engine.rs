//! Bicameral engine - paired R/L evaluators over one observation stream
//!
//! Each cycle records an Observation, generates hypotheses and runs every
//! hypothesis through the R (exploratory) evaluator. Only R-accepted
//! hypotheses cross the callosum to the L (conservative) evaluator.

use crate::generator::{HypothesisGenerator, StatisticalGenerator};
use crate::slot::{Slot, SlotLedgers};
use maat_core::{
    Clock, Decision, GateThresholds, Hemisphere, Ledger, Observation, Record, Result, SlotDecision,
    Stamper, SystemClock,
};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct EngineOptions {
    pub seed: u64,
    pub right: GateThresholds,
    pub left: GateThresholds,
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            right: GateThresholds::exploratory(),
            left: GateThresholds::conservative(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// L-hemisphere outcome: a decision, or `n/a` when R did not accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeftVerdict {
    Decided(Decision),
    NotApplicable,
}

impl LeftVerdict {
    pub fn decision(self) -> Option<Decision> {
        match self {
            LeftVerdict::Decided(d) => Some(d),
            LeftVerdict::NotApplicable => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeftVerdict::Decided(d) => d.as_str(),
            LeftVerdict::NotApplicable => "n/a",
        }
    }
}

impl Serialize for LeftVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HypothesisResult {
    pub hyp: String,
    pub claim: String,
    #[serde(rename = "R")]
    pub right: Decision,
    #[serde(rename = "L")]
    pub left: LeftVerdict,
}

#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub obs: String,
    pub src: String,
    pub results: Vec<HypothesisResult>,
}

impl CycleReport {
    pub fn accepted(&self, hemi: Hemisphere) -> usize {
        self.results
            .iter()
            .filter(|r| match hemi {
                Hemisphere::R => r.right == Decision::Accept,
                Hemisphere::L => r.left == LeftVerdict::Decided(Decision::Accept),
            })
            .count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HemisphereStats {
    pub total: usize,
    pub accept: usize,
    pub reject: usize,
    pub defer: usize,
    pub accept_rate: f64,
}

impl HemisphereStats {
    pub fn from_decisions(decisions: &[SlotDecision]) -> Self {
        let count = |d: Decision| decisions.iter().filter(|x| x.decision == d).count();
        let total = decisions.len();
        let accept = count(Decision::Accept);
        Self {
            total,
            accept,
            reject: count(Decision::Reject),
            defer: count(Decision::Defer),
            accept_rate: if total == 0 { 0.0 } else { accept as f64 / total as f64 },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineStats {
    #[serde(rename = "R")]
    pub right: HemisphereStats,
    #[serde(rename = "L")]
    pub left: HemisphereStats,
}

pub struct BicameralEngine {
    name: String,
    outdir: PathBuf,
    right: Slot,
    left: Slot,
    observations: Ledger,
    generator: Box<dyn HypothesisGenerator>,
    stamper: Stamper,
}

impl BicameralEngine {
    /// Build an engine whose streams live under `outdir`, prefixed by `name`.
    pub fn create(name: &str, outdir: &Path, options: EngineOptions) -> Result<Self> {
        std::fs::create_dir_all(outdir)?;
        let engine = Self {
            name: name.to_string(),
            outdir: outdir.to_path_buf(),
            right: Slot::new(
                Hemisphere::R,
                options.right,
                SlotLedgers::in_dir(outdir, name, Hemisphere::R),
            ),
            left: Slot::new(
                Hemisphere::L,
                options.left,
                SlotLedgers::in_dir(outdir, name, Hemisphere::L),
            ),
            observations: Ledger::new(outdir.join(format!("{}_observations.jsonl", name))),
            generator: Box::new(StatisticalGenerator),
            stamper: Stamper::new(options.seed, options.clock),
        };
        info!(
            engine = %engine.name,
            outdir = %engine.outdir.display(),
            seed = options.seed,
            "engine created"
        );
        Ok(engine)
    }

    pub fn with_generator(mut self, generator: impl HypothesisGenerator + 'static) -> Self {
        self.set_generator(Box::new(generator));
        self
    }

    pub fn set_generator(&mut self, generator: Box<dyn HypothesisGenerator>) {
        debug!(engine = %self.name, generator = generator.name(), "generator set");
        self.generator = generator;
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }
    pub fn observations(&self) -> &Ledger {
        &self.observations
    }
    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }
    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.stamper.clock()
    }

    pub fn slot(&self, hemi: Hemisphere) -> &Slot {
        match hemi {
            Hemisphere::R => &self.right,
            Hemisphere::L => &self.left,
        }
    }

    pub fn thresholds(&self, hemi: Hemisphere) -> GateThresholds {
        self.slot(hemi).thresholds()
    }

    pub fn set_thresholds(&mut self, hemi: Hemisphere, thresholds: GateThresholds) {
        match hemi {
            Hemisphere::R => self.right.set_thresholds(thresholds),
            Hemisphere::L => self.left.set_thresholds(thresholds),
        }
    }

    /// Observe one window and evaluate every generated hypothesis, R before L.
    pub fn cycle(&mut self, series: &[f64], src: &str) -> Result<CycleReport> {
        let mut obs = Observation::series(&mut self.stamper, src, series);
        obs.seal()?;
        self.observations.append(&obs)?;

        let obs_ids = [obs.id.clone()];
        let hyps = self
            .generator
            .generate(&mut self.stamper, &obs_ids, series, Hemisphere::R);

        let mut results = Vec::with_capacity(hyps.len());
        for hyp in &hyps {
            let right = self.right.decide(&mut self.stamper, hyp, series)?.verdict();
            let left = if right == Decision::Accept {
                LeftVerdict::Decided(self.left.decide(&mut self.stamper, hyp, series)?.verdict())
            } else {
                LeftVerdict::NotApplicable
            };
            results.push(HypothesisResult {
                hyp: hyp.id.clone(),
                claim: hyp.claim.clone(),
                right,
                left,
            });
        }

        let report = CycleReport {
            obs: obs.id,
            src: src.to_string(),
            results,
        };
        debug!(
            engine = %self.name,
            src,
            hypotheses = report.results.len(),
            r_accepts = report.accepted(Hemisphere::R),
            l_accepts = report.accepted(Hemisphere::L),
            "engine cycle"
        );
        Ok(report)
    }

    /// Decision counts per hemisphere, read back from the decision ledgers.
    pub fn stats(&self) -> Result<EngineStats> {
        let right = self.right.ledgers().decisions.read_typed::<SlotDecision>()?;
        let left = self.left.ledgers().decisions.read_typed::<SlotDecision>()?;
        Ok(EngineStats {
            right: HemisphereStats::from_decisions(&right),
            left: HemisphereStats::from_decisions(&left),
        })
    }
}

impl std::fmt::Debug for BicameralEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BicameralEngine")
            .field("name", &self.name)
            .field("outdir", &self.outdir)
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maat_core::SteppingClock;
    use tempfile::TempDir;

    fn options(seed: u64) -> EngineOptions {
        EngineOptions {
            seed,
            clock: Arc::new(SteppingClock::default()),
            ..Default::default()
        }
    }

    #[test]
    fn left_verdict_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&LeftVerdict::NotApplicable).unwrap(), "\"n/a\"");
        assert_eq!(
            serde_json::to_string(&LeftVerdict::Decided(Decision::Defer)).unwrap(),
            "\"defer\""
        );
    }

    #[test]
    fn stream_names_follow_engine_and_hemisphere() {
        let tmp = TempDir::new().unwrap();
        let engine = BicameralEngine::create("inner", tmp.path(), options(1)).unwrap();
        assert!(engine.observations().path().ends_with("inner_observations.jsonl"));
        assert!(engine
            .slot(Hemisphere::L)
            .ledgers()
            .receipts
            .path()
            .ends_with("inner_L_receipts.jsonl"));
    }

    #[test]
    fn permissive_right_gates_forward_to_left() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(2);
        opts.right = GateThresholds::new(0.0, 0.0, 1e9);
        let mut engine = BicameralEngine::create("t", tmp.path(), opts).unwrap();
        let report = engine.cycle(&[1.0, 2.0, 3.0, 4.0], "unit").unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(report.results.iter().all(|r| r.left != LeftVerdict::NotApplicable));

        let stats = engine.stats().unwrap();
        assert_eq!(stats.right.total, 3);
        assert_eq!(stats.right.accept_rate, 1.0);
        assert_eq!(stats.left.total, 3);
    }

    #[test]
    fn stats_on_fresh_engine_are_zero() {
        let tmp = TempDir::new().unwrap();
        let engine = BicameralEngine::create("t", tmp.path(), options(3)).unwrap();
        assert_eq!(engine.stats().unwrap(), EngineStats::default());
    }
}
