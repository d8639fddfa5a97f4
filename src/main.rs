//! maat - run the recursive MA'AT reactor
//!
//! Usage:
//!   maat --out ./out --cycles 100 --seed 42 [--use-policy] [--claims-file claims.txt]
//!
//! Writes one ledger per engine, hemisphere and record kind under `--out`,
//! plus `policy.json` and `policy_report.json` when the policy is enabled.

use clap::Parser;
use maat::LaunchOptions;
use maat_reactor::ReactorConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "maat", about = "Recursive MA'AT reactor")]
struct Cli {
    /// Output directory for ledgers and policy state
    #[arg(long, default_value = "./out")]
    out: PathBuf,

    /// Number of reactor cycles to run
    #[arg(long, default_value_t = 100)]
    cycles: u64,

    /// Seed for the engines and the external signal (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Path to config file (TOML). Default: <out>/maat.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Lower the SCRAM limits
    #[arg(long)]
    stress: bool,

    /// File of canned claims, one response per line
    #[arg(long)]
    claims_file: Option<PathBuf>,

    /// Enable the learned gates policy on the inner R hemisphere
    #[arg(long)]
    use_policy: bool,

    /// Use a fixed-epoch clock so repeated runs produce identical ledgers
    #[arg(long)]
    stepping_clock: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", ReactorConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = LaunchOptions {
        out: cli.out,
        cycles: cli.cycles,
        seed: cli.seed,
        config: cli.config,
        stress: cli.stress,
        claims_file: cli.claims_file,
        use_policy: cli.use_policy,
        stepping_clock: cli.stepping_clock,
    };
    let summary = maat::launch(&opts)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("cycles run: {}", summary.cycles_run);
        match summary.scram_at {
            Some(cycle) => println!("status: SCRAM at cycle {}", cycle),
            None => println!("status: OK"),
        }
        for (name, stats) in [("inner", &summary.inner), ("outer", &summary.outer)] {
            println!(
                "{} R: {} decisions, accept rate {:.3} | L: {} decisions, accept rate {:.3}",
                name, stats.right.total, stats.right.accept_rate, stats.left.total, stats.left.accept_rate
            );
        }
        if let Some(report) = &summary.policy {
            let t = report.current_thresholds;
            println!(
                "policy: bayes {:.3} coh {:.3} mdl {:.3} ({} updates)",
                t.bayes_min, t.coherence_min, t.mdl_max, report.update_count
            );
        }
    }

    Ok(())
}
