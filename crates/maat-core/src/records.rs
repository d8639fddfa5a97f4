//! AGL/1.0 record types
//!
//! Every record carries `spec`, `schema` and `ts`, its type-specific fields,
//! and the optional `ukh` content hash. Floats are stored as canonical
//! decimal strings so a record read back from a ledger hashes identically.

use crate::canonical::{self, decimal, decimal_map};
use crate::error::Result;
use crate::stamp::Stamper;
use crate::types::{Decision, GateThresholds, Hemisphere, ReceiptStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const AGL_SPEC: &str = "AGL/1.0";

/// A hashed, ledger-bound record.
pub trait Record: Serialize {
    const SCHEMA: &'static str;

    fn ukh(&self) -> Option<&str>;

    fn set_ukh(&mut self, ukh: String);

    /// Attach the content hash if absent and return it.
    fn seal(&mut self) -> Result<String> {
        if let Some(existing) = self.ukh() {
            return Ok(existing.to_string());
        }
        let raw = canonical::to_raw(self)?;
        let hash = canonical::compute_hash(&raw);
        self.set_ukh(hash.clone());
        Ok(hash)
    }
}

macro_rules! impl_record {
    ($ty:ty, $schema:literal) => {
        impl Record for $ty {
            const SCHEMA: &'static str = $schema;

            fn ukh(&self) -> Option<&str> {
                self.ukh.as_deref()
            }

            fn set_ukh(&mut self, ukh: String) {
                self.ukh = Some(ukh);
            }
        }
    };
}

// ============================================================
// Observation
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub id: String,
    pub src: String,
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl Observation {
    /// An observation of one numeric window, stored under `fields.x`.
    pub fn series(stamper: &mut Stamper, src: impl Into<String>, series: &[f64]) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "x".to_string(),
            Value::Array(series.iter().map(|x| Value::from(*x)).collect()),
        );
        Self::new(stamper, src, fields, Map::new())
    }

    pub fn new(
        stamper: &mut Stamper,
        src: impl Into<String>,
        fields: Map<String, Value>,
        meta: Map<String, Value>,
    ) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            id: stamper.id("obs"),
            src: src.into(),
            fields,
            meta,
            ukh: None,
        }
    }
}

impl_record!(Observation, "AGL/Observation");

// ============================================================
// Hypothesis
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BetaPrior {
    pub dist: String,
    #[serde(with = "decimal")]
    pub a: f64,
    #[serde(with = "decimal")]
    pub b: f64,
}

impl BetaPrior {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            dist: "Beta".into(),
            a,
            b,
        }
    }

    pub fn mean(&self) -> f64 {
        self.a / (self.a + self.b)
    }
}

impl Default for BetaPrior {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hypothesis {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub id: String,
    pub hemi: Hemisphere,
    pub claim: String,
    pub from: Vec<String>,
    pub prior: BetaPrior,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub windows: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl Hypothesis {
    pub fn new(
        stamper: &mut Stamper,
        claim: impl Into<String>,
        hemi: Hemisphere,
        from: &[String],
        prior: Option<BetaPrior>,
    ) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            id: stamper.id("hyp"),
            hemi,
            claim: claim.into(),
            from: from.to_vec(),
            prior: prior.unwrap_or_default(),
            rules: Vec::new(),
            windows: Vec::new(),
            ukh: None,
        }
    }
}

impl_record!(Hypothesis, "AGL/Hypothesis");

// ============================================================
// Test
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestDesign {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "decimal")]
    pub holdout: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Power {
    #[serde(with = "decimal")]
    pub alpha: f64,
    #[serde(with = "decimal")]
    pub beta: f64,
}

/// One evaluation of a hypothesis: the methodology and the metrics computed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Test {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub id: String,
    pub hyp: String,
    pub design: TestDesign,
    pub metrics: Vec<MetricSpec>,
    pub power: Power,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl Test {
    pub fn new(stamper: &mut Stamper, hyp: &str) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            id: stamper.id("tst"),
            hyp: hyp.to_string(),
            design: TestDesign {
                kind: "rolling".into(),
                holdout: 0.2,
            },
            metrics: ["posterior_mean", "coh_peak_mean", "mdl_delta_bits"]
                .iter()
                .map(|name| MetricSpec {
                    name: name.to_string(),
                })
                .collect(),
            power: Power {
                alpha: 0.05,
                beta: 0.2,
            },
            ukh: None,
        }
    }
}

impl_record!(Test, "AGL/Test");

// ============================================================
// Evidence
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Posterior {
    pub dist: String,
    #[serde(with = "decimal")]
    pub a: f64,
    #[serde(with = "decimal")]
    pub b: f64,
    #[serde(with = "decimal")]
    pub mean: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BayesBlock {
    pub posterior: Posterior,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CoherenceBlock {
    #[serde(with = "decimal")]
    pub peak_mean: f64,
    #[serde(with = "decimal_map")]
    pub multi_scale: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MdlBlock {
    #[serde(with = "decimal")]
    pub bits_delta: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResidualStats {
    #[serde(with = "decimal")]
    pub norm: f64,
    #[serde(with = "decimal")]
    pub outlier_rate: f64,
}

/// Measured support for a hypothesis over one window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub tst: String,
    pub hyp: String,
    pub bayes: BayesBlock,
    pub coherence: CoherenceBlock,
    pub mdl: MdlBlock,
    pub residuals: ResidualStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl Evidence {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stamper: &mut Stamper,
        tst: &str,
        hyp: &str,
        posterior: Posterior,
        peak_mean: f64,
        multi_scale: BTreeMap<String, f64>,
        bits_delta: f64,
        residuals: ResidualStats,
    ) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            tst: tst.to_string(),
            hyp: hyp.to_string(),
            bayes: BayesBlock { posterior },
            coherence: CoherenceBlock {
                peak_mean,
                multi_scale,
            },
            mdl: MdlBlock { bits_delta },
            residuals,
            ukh: None,
        }
    }

    pub fn posterior_mean(&self) -> f64 {
        self.bayes.posterior.mean
    }

    pub fn coherence(&self) -> f64 {
        self.coherence.peak_mean
    }

    pub fn mdl_bits(&self) -> f64 {
        self.mdl.bits_delta
    }
}

impl_record!(Evidence, "AGL/Evidence");

// ============================================================
// SlotDecision
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GateSnapshot {
    #[serde(with = "decimal")]
    pub bayes_threshold: f64,
    #[serde(with = "decimal")]
    pub coherence_threshold: f64,
    #[serde(with = "decimal")]
    pub mdl_threshold: f64,
}

impl From<GateThresholds> for GateSnapshot {
    fn from(t: GateThresholds) -> Self {
        Self {
            bayes_threshold: t.bayes_min,
            coherence_threshold: t.coherence_min,
            mdl_threshold: t.mdl_max,
        }
    }
}

/// Diagnostic attention allocation. Never feeds the gate verdict.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AttentionMetrics {
    #[serde(with = "decimal")]
    pub nov: f64,
    #[serde(with = "decimal")]
    pub coh: f64,
    #[serde(with = "decimal")]
    pub risk: f64,
    #[serde(with = "decimal")]
    pub chaos: f64,
    #[serde(with = "decimal")]
    pub att: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotDecision {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub hyp: String,
    pub tst: String,
    pub gate: GateSnapshot,
    pub decision: Decision,
    pub attention: AttentionMetrics,
    pub reason: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl SlotDecision {
    pub fn new(
        stamper: &mut Stamper,
        hyp: &str,
        tst: &str,
        decision: Decision,
        gates: GateThresholds,
        attention: AttentionMetrics,
        reason: Vec<String>,
    ) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            hyp: hyp.to_string(),
            tst: tst.to_string(),
            gate: gates.into(),
            decision,
            attention,
            reason,
            ukh: None,
        }
    }
}

impl_record!(SlotDecision, "AGL/SlotDecision");

// ============================================================
// Receipt
// ============================================================

/// Terminal record of one evaluation, pointing at its evidence and decision by hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receipt {
    pub spec: String,
    pub schema: String,
    pub ts: String,
    pub slot_id: String,
    pub status: ReceiptStatus,
    pub hyp: String,
    pub evid: String,
    pub decision_ukh: String,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ukh: Option<String>,
}

impl Receipt {
    pub fn new(
        stamper: &mut Stamper,
        hemi: Hemisphere,
        status: ReceiptStatus,
        hyp: &str,
        evid: &str,
        decision_ukh: &str,
        note: impl Into<String>,
    ) -> Self {
        Self {
            spec: AGL_SPEC.into(),
            schema: Self::SCHEMA.into(),
            ts: stamper.timestamp(),
            slot_id: hemi.slot_id().to_string(),
            status,
            hyp: hyp.to_string(),
            evid: evid.to_string(),
            decision_ukh: decision_ukh.to_string(),
            note: note.into(),
            ukh: None,
        }
    }
}

impl_record!(Receipt, "AGL/Receipt");
