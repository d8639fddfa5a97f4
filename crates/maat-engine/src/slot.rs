//! Slot: one gate evaluator bound to a hemisphere and its four ledger streams
//!
//! A hypothesis is tested against a window with three gates: Bayesian
//! posterior mean, spectral coherence and MDL delta. Every evaluation emits
//! Test, Evidence, SlotDecision and Receipt records, hashed and appended in
//! that order.

use crate::mathx::{self, bayesian_update, fft_peak_mean, mdl_delta_bits, residual_stats};
use maat_core::{
    AttentionMetrics, Decision, Evidence, GateThresholds, Hemisphere, Hypothesis, Ledger, Posterior,
    Receipt, ReceiptStatus, Record, Result, SlotDecision, Stamper, Test,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Parameters of the linear model scored by the MDL gate.
const LINEAR_MODEL_PARAMS: usize = 2;

/// The four per-hemisphere ledger streams.
#[derive(Clone, Debug)]
pub struct SlotLedgers {
    pub tests: Ledger,
    pub evidence: Ledger,
    pub decisions: Ledger,
    pub receipts: Ledger,
}

impl SlotLedgers {
    /// `<outdir>/<engine>_<hemi>_<kind>.jsonl`
    pub fn in_dir(outdir: &Path, engine: &str, hemi: Hemisphere) -> Self {
        let stream = |kind: &str| Ledger::new(outdir.join(format!("{}_{}_{}.jsonl", engine, hemi, kind)));
        Self {
            tests: stream("tests"),
            evidence: stream("evidence"),
            decisions: stream("decisions"),
            receipts: stream("receipts"),
        }
    }
}

/// Everything one evaluation produced.
#[derive(Clone, Debug)]
pub struct SlotOutcome {
    pub test: Test,
    pub evidence: Evidence,
    pub decision: SlotDecision,
    pub receipt: Receipt,
}

impl SlotOutcome {
    pub fn verdict(&self) -> Decision {
        self.decision.decision
    }
}

#[derive(Debug)]
pub struct Slot {
    hemi: Hemisphere,
    thresholds: GateThresholds,
    ledgers: SlotLedgers,
}

impl Slot {
    pub fn new(hemi: Hemisphere, thresholds: GateThresholds, ledgers: SlotLedgers) -> Self {
        Self {
            hemi,
            thresholds,
            ledgers,
        }
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemi
    }

    pub fn thresholds(&self) -> GateThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: GateThresholds) {
        self.thresholds = thresholds;
    }

    pub fn ledgers(&self) -> &SlotLedgers {
        &self.ledgers
    }

    /// Evaluate `hyp` against `series` and append the four resulting records.
    pub fn decide(&self, stamper: &mut Stamper, hyp: &Hypothesis, series: &[f64]) -> Result<SlotOutcome> {
        let bayes = bayesian_update(series, &hyp.prior);
        let coh = fft_peak_mean(series);
        let mdl_bits = mdl_delta_bits(series, LINEAR_MODEL_PARAMS);

        let mut test = Test::new(stamper, &hyp.id);
        test.seal()?;

        let mut multi_scale = BTreeMap::new();
        multi_scale.insert("T".to_string(), coh);
        for (i, share) in mathx::wavelet_coherence(series).coherence.iter().enumerate() {
            multi_scale.insert(format!("haar_L{}", i + 1), *share);
        }

        let mut evidence = Evidence::new(
            stamper,
            &test.id,
            &hyp.id,
            Posterior {
                dist: "Beta".into(),
                a: bayes.a,
                b: bayes.b,
                mean: bayes.mean,
            },
            coh,
            multi_scale,
            mdl_bits,
            residual_stats(series),
        );
        let evid_ukh = evidence.seal()?;

        let attention = attention_metrics(series, coh, mdl_bits);
        let (verdict, reasons) = evaluate_gates(bayes.mean, coh, mdl_bits, &self.thresholds);

        let mut decision = SlotDecision::new(
            stamper,
            &hyp.id,
            &test.id,
            verdict,
            self.thresholds,
            attention,
            reasons,
        );
        let decision_ukh = decision.seal()?;

        let mut receipt = Receipt::new(
            stamper,
            self.hemi,
            ReceiptStatus::from(verdict),
            &hyp.id,
            &evid_ukh,
            &decision_ukh,
            format!("hemi={}", self.hemi),
        );
        receipt.seal()?;

        self.ledgers.tests.append(&test)?;
        self.ledgers.evidence.append(&evidence)?;
        self.ledgers.decisions.append(&decision)?;
        self.ledgers.receipts.append(&receipt)?;

        debug!(
            hemi = %self.hemi,
            hyp = %hyp.id,
            decision = %verdict,
            posterior_mean = bayes.mean,
            coherence = coh,
            mdl_bits,
            "slot decision"
        );

        Ok(SlotOutcome {
            test,
            evidence,
            decision,
            receipt,
        })
    }
}

/// Triple-gate verdict with one human-readable reason per gate.
///
/// Accept needs all three gates; reject means neither the Bayes nor the
/// coherence gate passed; anything else defers.
pub fn evaluate_gates(
    posterior_mean: f64,
    coherence: f64,
    mdl_bits: f64,
    thresholds: &GateThresholds,
) -> (Decision, Vec<String>) {
    let ok_bayes = posterior_mean >= thresholds.bayes_min;
    let ok_coh = coherence >= thresholds.coherence_min;
    let ok_mdl = mdl_bits <= thresholds.mdl_max;

    let reasons = vec![
        format!(
            "posterior_mean={:.3} {} {:.2}",
            posterior_mean,
            if ok_bayes { ">=" } else { "<" },
            thresholds.bayes_min
        ),
        format!(
            "coherence={:.2} {} {:.2}",
            coherence,
            if ok_coh { ">=" } else { "<" },
            thresholds.coherence_min
        ),
        format!(
            "mdl_bits={:.2} {} {:.2}",
            mdl_bits,
            if ok_mdl { "<=" } else { ">" },
            thresholds.mdl_max
        ),
    ];

    let decision = if ok_bayes && ok_coh && ok_mdl {
        Decision::Accept
    } else if ok_bayes || ok_coh {
        Decision::Defer
    } else {
        Decision::Reject
    };

    (decision, reasons)
}

/// Diagnostic attention allocation: logistic of novelty, coherence, risk and chaos.
pub fn attention_metrics(series: &[f64], coherence: f64, mdl_bits: f64) -> AttentionMetrics {
    if series.is_empty() {
        return AttentionMetrics::default();
    }

    let mu = mathx::mean(series);
    let nov = (mu.abs() / (1.0 + mu.abs())).min(1.0);
    let coh = (coherence / 12.0).min(1.0);
    let risk = ((-mdl_bits).max(0.0) / 16.0).min(1.0);
    let mad = series.iter().map(|x| (x - mu).abs()).sum::<f64>() / series.len() as f64;
    let chaos = (mad / (1.0 + mu.abs())).min(1.0);

    let logit = 0.4 * nov + 0.3 * coh - 0.2 * risk - 0.1 * chaos;
    let att = 1.0 / (1.0 + (-logit).exp());

    AttentionMetrics {
        nov,
        coh,
        risk,
        chaos,
        att,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maat_core::{canonical::is_hash, SteppingClock};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn gates() -> GateThresholds {
        GateThresholds::new(0.7, 7.0, -5.0)
    }

    #[test]
    fn all_gates_pass_accepts() {
        let (d, reasons) = evaluate_gates(0.85, 10.0, -8.0, &gates());
        assert_eq!(d, Decision::Accept);
        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0], "posterior_mean=0.850 >= 0.70");
        assert_eq!(reasons[2], "mdl_bits=-8.00 <= -5.00");
    }

    #[test]
    fn bayes_and_coherence_fail_rejects() {
        let (d, reasons) = evaluate_gates(0.3, 2.0, 5.0, &gates());
        assert_eq!(d, Decision::Reject);
        assert_eq!(reasons[1], "coherence=2.00 < 7.00");
    }

    #[test]
    fn partial_pass_defers() {
        assert_eq!(evaluate_gates(0.75, 5.0, 2.0, &gates()).0, Decision::Defer);
        assert_eq!(evaluate_gates(0.1, 9.0, 2.0, &gates()).0, Decision::Defer);
        // mdl alone never rescues a reject
        assert_eq!(evaluate_gates(0.1, 1.0, -50.0, &gates()).0, Decision::Reject);
    }

    #[test]
    fn gate_boundaries_are_inclusive() {
        assert_eq!(evaluate_gates(0.7, 7.0, -5.0, &gates()).0, Decision::Accept);
    }

    #[test]
    fn attention_of_empty_series_is_zero() {
        assert_eq!(attention_metrics(&[], 3.0, -4.0), AttentionMetrics::default());
    }

    #[test]
    fn attention_is_a_probability() {
        let a = attention_metrics(&[1.0, 5.0, -3.0, 2.0], 30.0, -40.0);
        assert!(a.att > 0.0 && a.att < 1.0);
        assert_eq!(a.coh, 1.0);
        assert_eq!(a.risk, 1.0);
    }

    #[test]
    fn decide_writes_four_linked_records() {
        let tmp = TempDir::new().unwrap();
        let ledgers = SlotLedgers::in_dir(tmp.path(), "unit", Hemisphere::R);
        let slot = Slot::new(Hemisphere::R, GateThresholds::exploratory(), ledgers);
        let mut stamper = Stamper::new(9, Arc::new(SteppingClock::default()));
        let hyp = Hypothesis::new(&mut stamper, "slope>0.000 implies trend", Hemisphere::R, &[], None);

        let xs: Vec<f64> = (0..32).map(|t| (t as f64 / 3.0).sin()).collect();
        let out = slot.decide(&mut stamper, &hyp, &xs).unwrap();

        let l = slot.ledgers();
        assert_eq!(l.tests.len().unwrap(), 1);
        assert_eq!(l.evidence.len().unwrap(), 1);
        assert_eq!(l.decisions.len().unwrap(), 1);
        assert_eq!(l.receipts.len().unwrap(), 1);

        assert_eq!(out.evidence.tst, out.test.id);
        assert_eq!(out.receipt.evid, out.evidence.ukh.clone().unwrap());
        assert_eq!(out.receipt.decision_ukh, out.decision.ukh.clone().unwrap());
        assert_eq!(out.receipt.status, ReceiptStatus::from(out.verdict()));
        assert_eq!(out.receipt.note, "hemi=R");
        assert!(is_hash(&out.receipt.evid));
        assert!(out.evidence.coherence.multi_scale.contains_key("T"));
    }

    #[test]
    fn empty_series_never_fails() {
        let tmp = TempDir::new().unwrap();
        let slot = Slot::new(
            Hemisphere::L,
            GateThresholds::conservative(),
            SlotLedgers::in_dir(tmp.path(), "unit", Hemisphere::L),
        );
        let mut stamper = Stamper::new(1, Arc::new(SteppingClock::default()));
        let hyp = Hypothesis::new(&mut stamper, "empty", Hemisphere::L, &[], None);
        let out = slot.decide(&mut stamper, &hyp, &[]).unwrap();
        assert_eq!(out.evidence.posterior_mean(), 0.5);
        assert_eq!(out.evidence.coherence(), 0.0);
        assert_eq!(out.evidence.mdl_bits(), 0.0);
        assert_eq!(out.verdict(), Decision::Reject);
    }
}
