//! Run orchestration for the `maat` binary
//!
//! Resolves configuration, wires generators and the optional learned policy
//! into a reactor, runs it and persists the policy artifacts.

use maat_core::{Clock, SteppingClock, SystemClock};
use maat_engine::{
    ClaimFile, EngineStats, HybridGenerator, LearnedGatesPolicy, PolicyReport, PromptedGenerator,
};
use maat_reactor::{CycleStatus, ReactorConfig, RecursiveReactor};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const POLICY_FILE: &str = "policy.json";
pub const POLICY_REPORT_FILE: &str = "policy_report.json";
pub const CONFIG_FILE: &str = "maat.toml";

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub out: PathBuf,
    pub cycles: u64,
    /// Overrides the configured seed.
    pub seed: Option<u64>,
    /// Config path. Default: `<out>/maat.toml`.
    pub config: Option<PathBuf>,
    pub stress: bool,
    /// Canned claims served round-robin to both engines, statistical fallback.
    pub claims_file: Option<PathBuf>,
    pub use_policy: bool,
    /// Fixed-epoch clock advancing 1ms per reading; makes whole runs replayable.
    pub stepping_clock: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            out: PathBuf::from("./out"),
            cycles: 100,
            seed: None,
            config: None,
            stress: false,
            claims_file: None,
            use_policy: false,
            stepping_clock: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LaunchSummary {
    pub cycles_run: u64,
    pub scram_at: Option<u64>,
    pub inner: EngineStats,
    pub outer: EngineStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyReport>,
}

pub fn resolve_config(opts: &LaunchOptions) -> ReactorConfig {
    let path = opts.config.clone().unwrap_or_else(|| opts.out.join(CONFIG_FILE));
    let mut config = ReactorConfig::load(&path);
    if let Some(seed) = opts.seed {
        config.seed = seed;
    }
    if opts.stress {
        info!("stress mode: lowering SCRAM limits");
        config = config.stressed();
    }
    config
}

pub fn launch(opts: &LaunchOptions) -> anyhow::Result<LaunchSummary> {
    let config = resolve_config(opts);

    // A starting point the policy loader would reject must fail before any ledger exists.
    let policy_path = opts.out.join(POLICY_FILE);
    let policy = if opts.use_policy || config.policy.enabled {
        let mut policy =
            LearnedGatesPolicy::with_thresholds(config.policy.policy_config(), config.gates.right);
        policy.state().validate()?;
        if policy.load(&policy_path)? {
            info!(path = %policy_path.display(), "resuming learned policy");
        }
        Some(policy)
    } else {
        None
    };

    let clock: Arc<dyn Clock> = if opts.stepping_clock {
        Arc::new(SteppingClock::default())
    } else {
        Arc::new(SystemClock)
    };
    let mut reactor = RecursiveReactor::with_clock(&opts.out, &config, clock)?;

    if let Some(path) = &opts.claims_file {
        let claims = ClaimFile::open(path)
            .map_err(|e| anyhow::anyhow!("cannot read claims file {}: {}", path.display(), e))?;
        info!(path = %path.display(), claims = claims.len(), "using claims file");
        reactor
            .inner_mut()
            .set_generator(Box::new(HybridGenerator::new(Some(PromptedGenerator::new(claims.clone())))));
        reactor
            .outer_mut()
            .set_generator(Box::new(HybridGenerator::new(Some(PromptedGenerator::new(claims)))));
    }

    if let Some(policy) = policy {
        reactor = reactor.with_policy(policy);
    }

    let results = reactor.run(opts.cycles)?;
    let scram_at = results
        .iter()
        .find(|r| r.status == CycleStatus::Scram)
        .map(|r| r.cycle);
    if let Some(cycle) = scram_at {
        warn!(cycle, "reactor shut down by SCRAM");
    }

    let policy = match reactor.policy() {
        Some(policy) => {
            policy.save(&policy_path)?;
            let report = policy.report();
            let report_path = opts.out.join(POLICY_REPORT_FILE);
            std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
            info!(
                path = %policy_path.display(),
                updates = policy.update_count(),
                "policy saved"
            );
            Some(report)
        }
        None => None,
    };

    let summary = LaunchSummary {
        cycles_run: results.len() as u64,
        scram_at,
        inner: reactor.inner().stats()?,
        outer: reactor.outer().stats()?,
        policy,
    };
    info!(
        cycles = summary.cycles_run,
        inner_r_accept_rate = summary.inner.right.accept_rate,
        outer_r_accept_rate = summary.outer.right.accept_rate,
        "run complete"
    );
    Ok(summary)
}
