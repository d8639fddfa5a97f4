//! Vocabulary shared by evaluators, engines and the policy controller

use serde::{Deserialize, Serialize};

/// Evaluation path: R is exploratory (loose), L is conservative (strict).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    R,
    L,
}

impl Hemisphere {
    pub fn tag(self) -> &'static str {
        match self {
            Hemisphere::R => "R",
            Hemisphere::L => "L",
        }
    }

    /// Receipt slot identifier (`slot_R` / `slot_L`).
    pub fn slot_id(self) -> &'static str {
        match self {
            Hemisphere::R => "slot_R",
            Hemisphere::L => "slot_L",
        }
    }
}

impl std::fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Gate verdict for one hypothesis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
    Defer,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
            Decision::Defer => "defer",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status carried by a receipt.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Accepted,
    Rejected,
    Deferred,
}

impl From<Decision> for ReceiptStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => ReceiptStatus::Accepted,
            Decision::Reject => ReceiptStatus::Rejected,
            Decision::Defer => ReceiptStatus::Deferred,
        }
    }
}

impl ReceiptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptStatus::Accepted => "accepted",
            ReceiptStatus::Rejected => "rejected",
            ReceiptStatus::Deferred => "deferred",
        }
    }
}

/// Gate thresholds owned by one evaluator.
///
/// Serialized with the short keys used by persisted policy state
/// (`bayes`, `coh`, `mdl`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct GateThresholds {
    /// Minimum posterior mean.
    #[serde(rename = "bayes")]
    pub bayes_min: f64,
    /// Minimum spectral peak-to-mean ratio.
    #[serde(rename = "coh")]
    pub coherence_min: f64,
    /// Maximum MDL delta in bits (negative means the model compresses).
    #[serde(rename = "mdl")]
    pub mdl_max: f64,
}

impl GateThresholds {
    pub const fn new(bayes_min: f64, coherence_min: f64, mdl_max: f64) -> Self {
        Self {
            bayes_min,
            coherence_min,
            mdl_max,
        }
    }

    /// Default R-hemisphere gates.
    pub const fn exploratory() -> Self {
        Self::new(0.80, 7.5, -8.0)
    }

    /// Default L-hemisphere gates.
    pub const fn conservative() -> Self {
        Self::new(0.95, 8.5, -16.0)
    }

    pub fn is_finite(&self) -> bool {
        self.bayes_min.is_finite() && self.coherence_min.is_finite() && self.mdl_max.is_finite()
    }
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self::exploratory()
    }
}
