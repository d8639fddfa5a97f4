//! Learned gates policy - online threshold controller
//!
//! Steers one evaluator's thresholds toward a target acceptance band and
//! away from observed regret. The controller only sees ledger excerpts
//! (`PolicyInputs`) and hands back new thresholds; the caller decides where
//! to apply them.

use maat_core::{
    Decision, Error, Evidence, GateThresholds, Ledger, Result, RingBuffer, SlotDecision,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const HISTORY_CAPACITY: usize = 100;
const TRACKED_IDS: usize = 50;
const REPORT_HISTORY: usize = 20;
const REGRET_TRIGGER: f64 = 0.3;
const STRONG_COHERENCE: f64 = 10.0;

const BAYES_RANGE: (f64, f64) = (0.5, 0.98);
const COHERENCE_RANGE: (f64, f64) = (3.0, 15.0);
const MDL_RANGE: (f64, f64) = (-20.0, -2.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Lower edge of the target acceptance band.
    pub target_accept_min: f64,
    /// Upper edge of the target acceptance band.
    pub target_accept_max: f64,
    pub learning_rate: f64,
    /// Steps that must elapse after a change before the next one.
    pub cooldown: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            target_accept_min: 0.20,
            target_accept_max: 0.35,
            learning_rate: 0.05,
            cooldown: 10,
        }
    }
}

/// Ledger excerpt consumed by one `step`.
#[derive(Debug, Clone, Default)]
pub struct PolicyInputs {
    pub acceptance_rate: f64,
    pub recent_decisions: Vec<SlotDecision>,
    pub recent_evidence: Vec<Evidence>,
}

impl PolicyInputs {
    const RATE_WINDOW: usize = 10;
    const EXCERPT: usize = 20;

    /// Acceptance over the last 10 decisions (0.0 until 10 exist), plus the
    /// last 20 decisions and evidence records.
    pub fn from_ledgers(decisions: &Ledger, evidence: &Ledger) -> Result<Self> {
        let all: Vec<SlotDecision> = decisions.read_typed()?;
        let acceptance_rate = if all.len() >= Self::RATE_WINDOW {
            let accepts = all[all.len() - Self::RATE_WINDOW..]
                .iter()
                .filter(|d| d.decision == Decision::Accept)
                .count();
            accepts as f64 / Self::RATE_WINDOW as f64
        } else {
            0.0
        };
        let recent_decisions = all[all.len().saturating_sub(Self::EXCERPT)..].to_vec();
        Ok(Self {
            acceptance_rate,
            recent_decisions,
            recent_evidence: evidence.tail(Self::EXCERPT)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub acceptance_rate: f64,
    pub regret_false_accept: f64,
    pub regret_false_reject: f64,
    pub thresholds: GateThresholds,
}

/// Persisted controller state. History is not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyState {
    pub thresholds: GateThresholds,
    #[serde(default)]
    pub update_count: u64,
    #[serde(default)]
    pub cycles_since_update: u64,
    pub target_band: [f64; 2],
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_cooldown")]
    pub cooldown: u32,
}

fn default_learning_rate() -> f64 {
    PolicyConfig::default().learning_rate
}

fn default_cooldown() -> u32 {
    PolicyConfig::default().cooldown
}

impl PolicyState {
    /// Reject anything a running controller could never have produced.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !t.is_finite() {
            return Err(Error::configuration("policy thresholds must be finite"));
        }
        let within = |v: f64, (lo, hi): (f64, f64)| (lo..=hi).contains(&v);
        if !within(t.bayes_min, BAYES_RANGE) {
            return Err(Error::configuration(format!(
                "bayes threshold {} outside [{}, {}]",
                t.bayes_min, BAYES_RANGE.0, BAYES_RANGE.1
            )));
        }
        if !within(t.coherence_min, COHERENCE_RANGE) {
            return Err(Error::configuration(format!(
                "coherence threshold {} outside [{}, {}]",
                t.coherence_min, COHERENCE_RANGE.0, COHERENCE_RANGE.1
            )));
        }
        if !within(t.mdl_max, MDL_RANGE) {
            return Err(Error::configuration(format!(
                "mdl threshold {} outside [{}, {}]",
                t.mdl_max, MDL_RANGE.0, MDL_RANGE.1
            )));
        }
        let [lo, hi] = self.target_band;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(Error::configuration(format!(
                "target band [{}, {}] is not an interval within [0, 1]",
                lo, hi
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::configuration(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyStats {
    pub avg_acceptance_rate: f64,
    pub avg_regret_false_accept: f64,
    pub avg_regret_false_reject: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyReport {
    pub current_thresholds: GateThresholds,
    pub update_count: u64,
    pub cycles_since_update: u64,
    pub target_band: [f64; 2],
    pub recent_history: Vec<HistoryEntry>,
    pub stats: PolicyStats,
}

#[derive(Debug)]
pub struct LearnedGatesPolicy {
    config: PolicyConfig,
    thresholds: GateThresholds,
    history: RingBuffer<HistoryEntry>,
    accepted: RingBuffer<String>,
    rejected: RingBuffer<String>,
    update_count: u64,
    cycles_since_update: u64,
}

impl LearnedGatesPolicy {
    /// Starts from the exploratory gates.
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_thresholds(config, GateThresholds::exploratory())
    }

    pub fn with_thresholds(config: PolicyConfig, thresholds: GateThresholds) -> Self {
        Self {
            config,
            thresholds,
            history: RingBuffer::new(HISTORY_CAPACITY),
            accepted: RingBuffer::new(TRACKED_IDS),
            rejected: RingBuffer::new(TRACKED_IDS),
            update_count: 0,
            cycles_since_update: 0,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
    pub fn thresholds(&self) -> GateThresholds {
        self.thresholds
    }
    pub fn update_count(&self) -> u64 {
        self.update_count
    }
    pub fn cycles_since_update(&self) -> u64 {
        self.cycles_since_update
    }
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    /// Fold one ledger excerpt in and return the (possibly updated) thresholds.
    pub fn step(&mut self, inputs: &PolicyInputs) -> GateThresholds {
        self.cycles_since_update += 1;

        for dec in &inputs.recent_decisions {
            match dec.decision {
                Decision::Accept => self.accepted.push(dec.hyp.clone()),
                Decision::Reject => self.rejected.push(dec.hyp.clone()),
                Decision::Defer => {}
            }
        }

        // Tracked ids never expire on consultation; the same evidence can
        // count toward regret on consecutive steps.
        let regret_false_accept =
            tracked_share(&self.accepted, &inputs.recent_evidence, |e| e.mdl_bits() > 0.0);
        let regret_false_reject = tracked_share(&self.rejected, &inputs.recent_evidence, |e| {
            e.coherence() > STRONG_COHERENCE
        });

        self.history.push(HistoryEntry {
            acceptance_rate: inputs.acceptance_rate,
            regret_false_accept,
            regret_false_reject,
            thresholds: self.thresholds,
        });

        if self.cycles_since_update < u64::from(self.config.cooldown) {
            return self.thresholds;
        }

        let before = self.thresholds;
        let mut changes = 0u64;
        if inputs.acceptance_rate < self.config.target_accept_min {
            self.loosen(1.0);
            changes += 1;
        } else if inputs.acceptance_rate > self.config.target_accept_max {
            self.tighten(1.0);
            changes += 1;
        }
        if regret_false_accept > REGRET_TRIGGER {
            self.tighten(0.5);
            changes += 1;
        }
        if regret_false_reject > REGRET_TRIGGER {
            self.loosen(0.5);
            changes += 1;
        }

        if changes > 0 {
            self.update_count += changes;
            self.cycles_since_update = 0;
            info!(
                updates = self.update_count,
                acceptance_rate = inputs.acceptance_rate,
                regret_false_accept,
                regret_false_reject,
                bayes = self.thresholds.bayes_min,
                coh = self.thresholds.coherence_min,
                mdl = self.thresholds.mdl_max,
                "policy thresholds updated"
            );
            debug!(?before, after = ?self.thresholds, "policy step");
        }
        self.thresholds
    }

    fn loosen(&mut self, factor: f64) {
        let eta = self.config.learning_rate * factor;
        let t = &mut self.thresholds;
        t.bayes_min = (t.bayes_min - eta).max(BAYES_RANGE.0);
        t.coherence_min = (t.coherence_min - 5.0 * eta).max(COHERENCE_RANGE.0);
        t.mdl_max = (t.mdl_max + 10.0 * eta).min(MDL_RANGE.1);
    }

    fn tighten(&mut self, factor: f64) {
        let eta = self.config.learning_rate * factor;
        let t = &mut self.thresholds;
        t.bayes_min = (t.bayes_min + eta).min(BAYES_RANGE.1);
        t.coherence_min = (t.coherence_min + 5.0 * eta).min(COHERENCE_RANGE.1);
        t.mdl_max = (t.mdl_max - 10.0 * eta).max(MDL_RANGE.0);
    }

    pub fn report(&self) -> PolicyReport {
        let skip = self.history.len().saturating_sub(REPORT_HISTORY);
        let recent: Vec<HistoryEntry> = self.history.iter().skip(skip).cloned().collect();
        let avg = |f: fn(&HistoryEntry) -> f64| {
            if recent.is_empty() {
                0.0
            } else {
                recent.iter().map(f).sum::<f64>() / recent.len() as f64
            }
        };
        let stats = PolicyStats {
            avg_acceptance_rate: avg(|h| h.acceptance_rate),
            avg_regret_false_accept: avg(|h| h.regret_false_accept),
            avg_regret_false_reject: avg(|h| h.regret_false_reject),
        };
        PolicyReport {
            current_thresholds: self.thresholds,
            update_count: self.update_count,
            cycles_since_update: self.cycles_since_update,
            target_band: [self.config.target_accept_min, self.config.target_accept_max],
            recent_history: recent,
            stats,
        }
    }

    pub fn state(&self) -> PolicyState {
        PolicyState {
            thresholds: self.thresholds,
            update_count: self.update_count,
            cycles_since_update: self.cycles_since_update,
            target_band: [self.config.target_accept_min, self.config.target_accept_max],
            learning_rate: self.config.learning_rate,
            cooldown: self.config.cooldown,
        }
    }

    /// Adopt a persisted state. Invalid state is rejected and nothing changes.
    /// History and tracked ids are left as they are.
    pub fn restore(&mut self, state: PolicyState) -> Result<()> {
        state.validate()?;
        self.thresholds = state.thresholds;
        self.update_count = state.update_count;
        self.cycles_since_update = state.cycles_since_update;
        self.config = PolicyConfig {
            target_accept_min: state.target_band[0],
            target_accept_max: state.target_band[1],
            learning_rate: state.learning_rate,
            cooldown: state.cooldown,
        };
        Ok(())
    }

    /// Write state as pretty JSON via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "policy saved");
        Ok(())
    }

    /// Restore from `path`. A missing file is not an error and returns `false`.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let text = std::fs::read_to_string(path)?;
        let state: PolicyState = serde_json::from_str(&text)?;
        self.restore(state)?;
        info!(path = %path.display(), updates = self.update_count, "policy loaded");
        Ok(true)
    }
}

/// Matching evidence records over the tracked id count; 0.0 when either side is empty.
fn tracked_share(
    tracked: &RingBuffer<String>,
    evidence: &[Evidence],
    hit: impl Fn(&Evidence) -> bool,
) -> f64 {
    if tracked.is_empty() || evidence.is_empty() {
        return 0.0;
    }
    let hits = evidence
        .iter()
        .filter(|e| tracked.contains(&e.hyp) && hit(e))
        .count();
    hits as f64 / tracked.len() as f64
}
