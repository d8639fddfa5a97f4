//! Integration tests for maat-core: canonical codec, hashing, ledgers, records

use maat_core::canonical::{self, attach_hash, canonical_string, compute_hash, is_hash, RawRecord};
use maat_core::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn raw(v: Value) -> RawRecord {
    match v {
        Value::Object(m) => m,
        _ => panic!("expected object"),
    }
}

fn stamper(seed: u64) -> Stamper {
    Stamper::new(seed, Arc::new(SteppingClock::default()))
}

// ===========================================================================
// Canonical form
// ===========================================================================

#[test]
fn key_order_does_not_change_hash() {
    let a: RawRecord = serde_json::from_str(r#"{"z":1,"a":{"y":2,"b":[1,2]},"m":"s"}"#).unwrap();
    let b: RawRecord = serde_json::from_str(r#"{"m":"s","a":{"b":[1,2],"y":2},"z":1}"#).unwrap();
    assert_eq!(canonical_string(&a), canonical_string(&b));
    assert_eq!(compute_hash(&a), compute_hash(&b));
}

#[test]
fn numeric_literal_form_does_not_change_hash() {
    let a: RawRecord = serde_json::from_str(r#"{"x":0.1,"y":2.50}"#).unwrap();
    let b: RawRecord = serde_json::from_str(r#"{"x":1e-1,"y":2.5000}"#).unwrap();
    let c = raw(json!({"x": "0.1", "y": "2.5"}));
    assert_eq!(compute_hash(&a), compute_hash(&b));
    assert_eq!(compute_hash(&a), compute_hash(&c));
}

#[test]
fn hash_ignores_existing_hash_field() {
    let plain = raw(json!({"a": 1}));
    let tagged = raw(json!({"a": 1, "ukh": "anything"}));
    assert_eq!(compute_hash(&plain), compute_hash(&tagged));
}

#[test]
fn attach_hash_is_idempotent() {
    let mut rec = raw(json!({"a": 1.5, "b": [true, null]}));
    let first = attach_hash(&mut rec);
    let snapshot = rec.clone();
    let second = attach_hash(&mut rec);
    assert_eq!(first, second);
    assert_eq!(rec, snapshot);
    assert!(is_hash(&first));
}

#[test]
fn hash_changes_with_content() {
    let a = raw(json!({"status": "accepted"}));
    let b = raw(json!({"status": "rejected"}));
    assert_ne!(compute_hash(&a), compute_hash(&b));
}

// ===========================================================================
// Ledger
// ===========================================================================

#[test]
fn append_then_read_preserves_count_and_order() {
    let tmp = TempDir::new().unwrap();
    let ledger = Ledger::new(tmp.path().join("stream.jsonl"));
    for i in 0..25 {
        ledger.append(&json!({"seq": i, "v": i as f64 * 0.1})).unwrap();
    }
    let records = ledger.read_all().unwrap();
    assert_eq!(records.len(), 25);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(rec["seq"], json!(i));
        let hash = rec["ukh"].as_str().unwrap();
        assert!(is_hash(hash));
    }
    assert_eq!(ledger.verify().unwrap(), 25);
}

#[test]
fn reread_record_hashes_identically() {
    let tmp = TempDir::new().unwrap();
    let ledger = Ledger::new(tmp.path().join("stream.jsonl"));
    let hash = ledger.append(&json!({"x": [0.25, 0.5, 3.0], "n": 3})).unwrap();
    let back = ledger.read_all().unwrap().remove(0);
    assert_eq!(canonical::compute_hash(&back), hash);
}

#[test]
fn existing_lines_survive_later_appends() {
    let tmp = TempDir::new().unwrap();
    let ledger = Ledger::new(tmp.path().join("stream.jsonl"));
    ledger.append(&json!({"a": 1})).unwrap();
    let before = std::fs::read_to_string(ledger.path()).unwrap();
    ledger.append(&json!({"a": 2})).unwrap();
    let after = std::fs::read_to_string(ledger.path()).unwrap();
    assert!(after.starts_with(&before));
}

// ===========================================================================
// Typed records through a ledger
// ===========================================================================

#[test]
fn typed_records_round_trip_through_ledger() {
    let tmp = TempDir::new().unwrap();
    let ledger = Ledger::new(tmp.path().join("inner_R_decisions.jsonl"));
    let mut s = stamper(11);
    let mut dec = SlotDecision::new(
        &mut s,
        "hyp_a",
        "tst_a",
        Decision::Defer,
        GateThresholds::exploratory(),
        AttentionMetrics::default(),
        vec!["posterior_mean=0.750 >= 0.70".into()],
    );
    let hash = dec.seal().unwrap();
    assert_eq!(ledger.append(&dec).unwrap(), hash);

    let back: Vec<SlotDecision> = ledger.read_typed().unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].decision, Decision::Defer);
    assert_eq!(back[0].gate.mdl_threshold, -8.0);
    assert_eq!(back[0].ukh.as_deref(), Some(hash.as_str()));
}

#[test]
fn typed_read_rejects_wrong_shape() {
    let tmp = TempDir::new().unwrap();
    let ledger = Ledger::new(tmp.path().join("x.jsonl"));
    ledger.append(&json!({"not": "a receipt"})).unwrap();
    let err = ledger.read_typed::<Receipt>().unwrap_err();
    assert!(err.is_format());
}

#[test]
fn records_carry_common_fields() {
    let mut s = stamper(5);
    let obs = Observation::series(&mut s, "external:world", &[1.0, 2.0]);
    assert_eq!(obs.spec, "AGL/1.0");
    assert_eq!(obs.schema, "AGL/Observation");
    assert!(obs.ts.ends_with('Z'));
    assert!(obs.id.starts_with("obs_"));
}
