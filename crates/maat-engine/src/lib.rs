//! MA'AT Engine - triple-gate evaluation, bicameral engine, learned gating policy
//!
//! Layering, leaf to root:
//! - `mathx`: Bayesian update, spectral coherence, MDL delta, Haar multi-scale
//! - `slot`: one gate evaluator writing Test/Evidence/Decision/Receipt records
//! - `generator`: pluggable hypothesis generation
//! - `engine`: paired R/L evaluators with callosum transfer
//! - `policy`: threshold controller fed by ledger excerpts

pub mod engine;
pub mod generator;
pub mod mathx;
pub mod policy;
pub mod slot;

pub use engine::{
    BicameralEngine, CycleReport, EngineOptions, EngineStats, HemisphereStats, HypothesisResult,
    LeftVerdict,
};
pub use generator::{
    parse_claims, ClaimFile, ClaimSource, HybridGenerator, HypothesisGenerator, PromptedGenerator,
    StatisticalGenerator,
};
pub use policy::{
    HistoryEntry, LearnedGatesPolicy, PolicyConfig, PolicyInputs, PolicyReport, PolicyState,
    PolicyStats,
};
pub use slot::{attention_metrics, evaluate_gates, Slot, SlotLedgers, SlotOutcome};
