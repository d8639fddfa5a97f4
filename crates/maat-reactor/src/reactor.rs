//! Recursive reactor - an engine watching an engine
//!
//! The inner engine observes a synthetic external signal. The outer engine
//! observes a smoothed acceptance signal derived from the inner engine's own
//! R receipts. Control rods react to telemetry each cycle and SCRAM halts the
//! run when criticality, temperature or grounding leave their limits.

use crate::config::{ReactorConfig, WindowConfig};
use crate::control::{ReactorControl, ReactorState, RodDepths, Scram};
use maat_core::{Clock, Decision, Hemisphere, Receipt, ReceiptStatus, Result, SlotDecision, SystemClock};
use maat_engine::{BicameralEngine, CycleReport, EngineOptions, LearnedGatesPolicy, PolicyInputs};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seed offset between the inner and outer engines.
const OUTER_SEED_OFFSET: u64 = 1000;
/// Cycle duration that maps to full temperature.
const TEMPERATURE_BASELINE_SECS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "SCRAM")]
    Scram,
}

impl CycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Ok => "OK",
            CycleStatus::Scram => "SCRAM",
        }
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub status: CycleStatus,
    pub cycle: u64,
    pub state: ReactorState,
    pub rods: RodDepths,
    pub inner: CycleReport,
    pub outer: CycleReport,
}

impl CycleResult {
    pub fn is_scram(&self) -> bool {
        self.status == CycleStatus::Scram
    }
}

pub struct RecursiveReactor {
    outdir: PathBuf,
    inner: BicameralEngine,
    outer: BicameralEngine,
    control: ReactorControl,
    scram: Scram,
    window: WindowConfig,
    rng: ChaCha20Rng,
    clock: Arc<dyn Clock>,
    /// Length of the previous external window; offsets the next one's time base.
    last_external_len: usize,
    cycle_count: u64,
    policy: Option<LearnedGatesPolicy>,
}

impl RecursiveReactor {
    /// Build a reactor on the wall clock.
    ///
    /// Ids still replay from the seed, but `ts` fields differ between runs,
    /// so ledgers are not byte-identical. Use [`Self::with_clock`] with a
    /// `SteppingClock` (the CLI's `--stepping-clock`) for exact replays.
    pub fn new(outdir: &Path, config: &ReactorConfig) -> Result<Self> {
        Self::with_clock(outdir, config, Arc::new(SystemClock))
    }

    /// Build a reactor whose engines and telemetry read time from `clock`.
    pub fn with_clock(outdir: &Path, config: &ReactorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(outdir)?;
        let engine_options = |seed: u64| EngineOptions {
            seed,
            right: config.gates.right,
            left: config.gates.left,
            clock: clock.clone(),
        };
        let inner = BicameralEngine::create("inner", outdir, engine_options(config.seed))?;
        let outer = BicameralEngine::create(
            "outer",
            outdir,
            engine_options(config.seed.wrapping_add(OUTER_SEED_OFFSET)),
        )?;
        info!(
            outdir = %outdir.display(),
            seed = config.seed,
            scram_enabled = config.scram.enabled,
            "reactor assembled"
        );
        Ok(Self {
            outdir: outdir.to_path_buf(),
            inner,
            outer,
            control: ReactorControl::default(),
            scram: config.scram,
            window: config.window.clone(),
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            clock,
            last_external_len: 0,
            cycle_count: 0,
            policy: None,
        })
    }

    /// Step `policy` after every cycle and apply its thresholds to the inner R evaluator.
    pub fn with_policy(mut self, policy: LearnedGatesPolicy) -> Self {
        self.inner.set_thresholds(Hemisphere::R, policy.thresholds());
        self.policy = Some(policy);
        self
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }
    pub fn inner(&self) -> &BicameralEngine {
        &self.inner
    }
    pub fn inner_mut(&mut self) -> &mut BicameralEngine {
        &mut self.inner
    }
    pub fn outer(&self) -> &BicameralEngine {
        &self.outer
    }
    pub fn outer_mut(&mut self) -> &mut BicameralEngine {
        &mut self.outer
    }
    pub fn control(&self) -> &ReactorControl {
        &self.control
    }
    pub fn scram(&self) -> &Scram {
        &self.scram
    }
    pub fn policy(&self) -> Option<&LearnedGatesPolicy> {
        self.policy.as_ref()
    }
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Two sines (periods 16 and 7), uniform noise and a slow drift.
    fn next_external(&mut self) -> Vec<f64> {
        let base = self.last_external_len;
        let vals: Vec<f64> = (0..self.window.external)
            .map(|t| {
                let t = (t + base) as f64;
                0.8 * (2.0 * PI * t / 16.0).sin()
                    + 0.2 * (2.0 * PI * t / 7.0).sin()
                    + self.rng.gen_range(-0.15..0.15)
                    + 0.002 * t
            })
            .collect();
        self.last_external_len = vals.len();
        vals
    }

    /// Exponentially smoothed acceptance signal over the latest inner R receipts.
    fn meta_series(&self) -> Result<Vec<f64>> {
        let window = self.window.meta;
        let receipts: Vec<Receipt> = self.inner.slot(Hemisphere::R).ledgers().receipts.tail(window)?;
        if receipts.is_empty() {
            return Ok(vec![0.0; window.min(4)]);
        }
        let mut s = 0.0;
        Ok(receipts
            .iter()
            .map(|r| {
                let sample = if r.status == ReceiptStatus::Accepted { 1.0 } else { 0.0 };
                s = 0.7 * s + 0.3 * sample;
                s
            })
            .collect())
    }

    fn recent_accepts(&self, engine: &BicameralEngine) -> Result<usize> {
        let recent: Vec<SlotDecision> = engine
            .slot(Hemisphere::R)
            .ledgers()
            .decisions
            .tail(self.window.criticality_lookback)?;
        Ok(recent.iter().filter(|d| d.decision == Decision::Accept).count())
    }

    /// One full reactor cycle. Any ledger error aborts the cycle.
    pub fn cycle(&mut self) -> Result<CycleResult> {
        let started = self.clock.now();
        self.cycle_count += 1;

        let external = self.next_external();
        let inner = self.inner.cycle(&external, "external:world")?;
        let meta = self.meta_series()?;

        let elapsed = (self.clock.now() - started)
            .num_microseconds()
            .unwrap_or(i64::MAX)
            .max(0) as f64
            / 1e6;
        self.control.telemetry.temperature = (elapsed / TEMPERATURE_BASELINE_SECS).min(1.0);
        self.control.telemetry.pressure = (meta.len() as f64 / self.window.meta.max(1) as f64).min(1.0);
        self.control.auto_adjust();

        // Advisory until generators take a count.
        let k_eff = self.control.moderate_generation(self.window.base_generation);
        debug!(cycle = self.cycle_count, k_eff, "moderated generation");

        let tail = &meta[meta.len().saturating_sub(self.window.outer_tail)..];
        let outer = self.outer.cycle(tail, "internal:inner_receipts")?;

        let inner_accepts = self.recent_accepts(&self.inner)?;
        let outer_accepts = self.recent_accepts(&self.outer)?;
        self.control.telemetry.criticality = (outer_accepts + 1) as f64 / (inner_accepts + 1) as f64;

        let reality_corr = 1.0 - (mean(&external) - mean(&meta)).abs().min(1.0);
        let t = self.control.telemetry;
        let state = ReactorState {
            criticality: t.criticality,
            temperature: t.temperature,
            pressure: t.pressure,
            reality_corr,
        };

        let status = if self.scram.should_scram(&state) {
            self.control.insert_all();
            warn!(cycle = self.cycle_count, ?state, "SCRAM tripped");
            CycleStatus::Scram
        } else {
            CycleStatus::Ok
        };

        self.step_policy()?;

        debug!(
            cycle = self.cycle_count,
            %status,
            criticality = state.criticality,
            temperature = state.temperature,
            pressure = state.pressure,
            reality_corr = state.reality_corr,
            "reactor cycle"
        );

        Ok(CycleResult {
            status,
            cycle: self.cycle_count,
            state,
            rods: self.control.rod_depths(),
            inner,
            outer,
        })
    }

    fn step_policy(&mut self) -> Result<()> {
        let Some(policy) = self.policy.as_mut() else {
            return Ok(());
        };
        let ledgers = self.inner.slot(Hemisphere::R).ledgers();
        let inputs = PolicyInputs::from_ledgers(&ledgers.decisions, &ledgers.evidence)?;
        let thresholds = policy.step(&inputs);
        self.inner.set_thresholds(Hemisphere::R, thresholds);
        Ok(())
    }

    /// Cycle up to `cycles` times, stopping after the first SCRAM.
    pub fn run(&mut self, cycles: u64) -> Result<Vec<CycleResult>> {
        let mut results = Vec::new();
        for _ in 0..cycles {
            let result = self.cycle()?;
            let scram = result.is_scram();
            if result.cycle % 10 == 0 || scram {
                info!(
                    cycle = result.cycle,
                    status = %result.status,
                    criticality = result.state.criticality,
                    temperature = result.state.temperature,
                    reality_corr = result.state.reality_corr,
                    "reactor progress"
                );
            }
            results.push(result);
            if scram {
                warn!(cycle = self.cycle_count, "reactor halted by SCRAM");
                break;
            }
        }
        Ok(results)
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maat_core::SteppingClock;
    use tempfile::TempDir;

    fn reactor(dir: &Path, config: &ReactorConfig) -> RecursiveReactor {
        RecursiveReactor::with_clock(dir, config, Arc::new(SteppingClock::default())).unwrap()
    }

    #[test]
    fn first_meta_series_is_four_zeros_before_any_receipt() {
        let tmp = TempDir::new().unwrap();
        let r = reactor(tmp.path(), &ReactorConfig::default());
        assert_eq!(r.meta_series().unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn external_window_shifts_time_base_after_first() {
        let tmp = TempDir::new().unwrap();
        let mut r = reactor(tmp.path(), &ReactorConfig::default());
        let first = r.next_external();
        assert_eq!(first.len(), 64);
        assert_eq!(r.last_external_len, 64);
        let second = r.next_external();
        assert_eq!(second.len(), 64);
        assert_ne!(first, second);
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&CycleStatus::Scram).unwrap(), "\"SCRAM\"");
        assert_eq!(serde_json::to_string(&CycleStatus::Ok).unwrap(), "\"OK\"");
    }

    #[test]
    fn one_cycle_touches_both_engines() {
        let tmp = TempDir::new().unwrap();
        let mut r = reactor(tmp.path(), &ReactorConfig::default());
        let res = r.cycle().unwrap();
        assert_eq!(res.cycle, 1);
        assert_eq!(res.inner.src, "external:world");
        assert_eq!(res.outer.src, "internal:inner_receipts");
        assert!(res.state.temperature >= 0.0 && res.state.temperature <= 1.0);
        assert!(res.state.pressure > 0.0);
        assert!(tmp.path().join("inner_observations.jsonl").exists());
        assert!(tmp.path().join("outer_R_receipts.jsonl").exists());
    }
}
