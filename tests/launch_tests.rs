//! End-to-end tests for the `maat` launcher: replayable runs, policy persistence, claims files

use maat::{launch, resolve_config, LaunchOptions};
use maat_core::{Ledger, SlotDecision};
use std::path::Path;
use tempfile::TempDir;

fn opts(out: &Path, cycles: u64) -> LaunchOptions {
    LaunchOptions {
        out: out.to_path_buf(),
        cycles,
        seed: Some(11),
        stepping_clock: true,
        ..Default::default()
    }
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

// ===========================================================================
// Replay
// ===========================================================================

#[test]
fn stepping_clock_runs_replay_byte_for_byte() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let sa = launch(&opts(a.path(), 5)).unwrap();
    let sb = launch(&opts(b.path(), 5)).unwrap();
    assert_eq!(sa.cycles_run, sb.cycles_run);

    for name in [
        "inner_observations.jsonl",
        "inner_R_decisions.jsonl",
        "inner_R_receipts.jsonl",
        "outer_R_evidence.jsonl",
        "outer_R_tests.jsonl",
    ] {
        assert_eq!(read(&a.path().join(name)), read(&b.path().join(name)), "{name} differs");
    }
}

#[test]
fn summary_counts_match_ledgers() {
    let tmp = TempDir::new().unwrap();
    let summary = launch(&opts(tmp.path(), 3)).unwrap();
    let decisions = Ledger::new(tmp.path().join("inner_R_decisions.jsonl"));
    assert_eq!(summary.inner.right.total, decisions.len().unwrap());
    assert_eq!(summary.inner.right.total, 3 * summary.cycles_run as usize);
    assert!(summary.policy.is_none());
    assert!(!tmp.path().join("policy.json").exists());
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn config_file_in_out_dir_is_picked_up() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("maat.toml"),
        "seed = 99\n[window]\nexternal = 32\n[scram]\nenabled = false\n",
    )
    .unwrap();
    let mut o = opts(tmp.path(), 1);
    o.seed = None;
    let config = resolve_config(&o);
    assert_eq!(config.seed, 99);
    assert_eq!(config.window.external, 32);
    assert!(!config.scram.enabled);

    o.seed = Some(5);
    o.stress = true;
    let config = resolve_config(&o);
    assert_eq!(config.seed, 5);
    assert_eq!(config.scram.criticality_limit, 1.3);
    assert!(!config.scram.enabled);
}

// ===========================================================================
// Policy persistence
// ===========================================================================

#[test]
fn policy_state_survives_between_runs() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("maat.toml"), "[scram]\nenabled = false\n[policy]\ncooldown = 1\n").unwrap();
    let mut o = opts(tmp.path(), 4);
    o.use_policy = true;

    let first = launch(&o).unwrap();
    let first_report = first.policy.unwrap();
    assert!(first_report.update_count > 0);
    assert!(tmp.path().join("policy.json").exists());
    assert!(tmp.path().join("policy_report.json").exists());

    let second = launch(&o).unwrap();
    let second_report = second.policy.unwrap();
    assert!(second_report.update_count >= first_report.update_count);
    assert_eq!(second_report.target_band, [0.20, 0.35]);
}

#[test]
fn corrupt_policy_file_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("policy.json"),
        r#"{"thresholds":{"bayes":0.8,"coh":99.0,"mdl":-8.0},"target_band":[0.2,0.35]}"#,
    )
    .unwrap();
    let mut o = opts(tmp.path(), 1);
    o.use_policy = true;
    let err = launch(&o).unwrap_err();
    assert!(err.to_string().contains("coherence threshold"));
}

#[test]
fn out_of_range_starting_gates_fail_before_any_ledger() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("maat.toml"),
        "[gates.right]\nbayes = 0.4\ncoh = 5.0\nmdl = -5.0\n",
    )
    .unwrap();
    let mut o = opts(tmp.path(), 2);
    o.use_policy = true;
    let err = launch(&o).unwrap_err();
    assert!(err.to_string().contains("bayes threshold"));
    assert!(!tmp.path().join("inner_observations.jsonl").exists());
    assert!(!tmp.path().join("policy.json").exists());

    // The same gates are fine when no policy will persist them.
    o.use_policy = false;
    launch(&o).unwrap();
}

#[test]
fn invalid_policy_section_fails_before_any_ledger() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("maat.toml"), "[policy]\nlearning_rate = 0.0\n").unwrap();
    let mut o = opts(tmp.path(), 1);
    o.use_policy = true;
    let err = launch(&o).unwrap_err();
    assert!(err.to_string().contains("learning rate"));
    assert!(!tmp.path().join("inner_observations.jsonl").exists());

    std::fs::write(
        tmp.path().join("maat.toml"),
        "[policy]\nenabled = true\ntarget_accept_min = 0.4\ntarget_accept_max = 1.5\n",
    )
    .unwrap();
    o.use_policy = false;
    let err = launch(&o).unwrap_err();
    assert!(err.to_string().contains("target band"));
    assert!(!tmp.path().join("policy.json").exists());
}

// ===========================================================================
// Claims file
// ===========================================================================

#[test]
fn claims_file_replaces_statistical_claims() {
    let tmp = TempDir::new().unwrap();
    let claims = tmp.path().join("claims.txt");
    std::fs::write(&claims, "- level holds, cycle repeats\n").unwrap();
    let mut o = opts(tmp.path(), 1);
    o.claims_file = Some(claims);
    launch(&o).unwrap();

    let decisions: Vec<SlotDecision> = Ledger::new(tmp.path().join("inner_R_decisions.jsonl"))
        .read_typed()
        .unwrap();
    assert_eq!(decisions.len(), 2);
    assert_ne!(decisions[0].hyp, decisions[1].hyp);
}

#[test]
fn missing_claims_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let mut o = opts(tmp.path(), 1);
    o.claims_file = Some(tmp.path().join("nope.txt"));
    assert!(launch(&o).is_err());
}
