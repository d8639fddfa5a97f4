//! Control rods and the SCRAM monitor
//!
//! Rods are damping knobs in [0, 1]. `ReactorControl` adjusts them from
//! telemetry every cycle; `Scram` decides when a cycle must halt.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlRod {
    name: &'static str,
    depth: f64,
}

impl ControlRod {
    pub fn new(name: &'static str) -> Self {
        Self { name, depth: 0.0 }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 0.0 is fully withdrawn, 1.0 fully inserted.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn insert(&mut self, amount: f64) {
        self.depth = (self.depth + amount).min(1.0);
    }

    pub fn withdraw(&mut self, amount: f64) {
        self.depth = (self.depth - amount).max(0.0);
    }

    fn force(&mut self, depth: f64) {
        self.depth = depth.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RodDepths {
    pub recursion_damper: f64,
    pub resource_governor: f64,
    pub reality_anchor: f64,
    pub semantic_filter: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Telemetry {
    pub criticality: f64,
    pub temperature: f64,
    pub pressure: f64,
}

#[derive(Debug, Clone)]
pub struct ReactorControl {
    pub recursion_damper: ControlRod,
    pub resource_governor: ControlRod,
    pub reality_anchor: ControlRod,
    pub semantic_filter: ControlRod,
    pub telemetry: Telemetry,
}

impl Default for ReactorControl {
    fn default() -> Self {
        Self {
            recursion_damper: ControlRod::new("recursion_damper"),
            resource_governor: ControlRod::new("resource_governor"),
            reality_anchor: ControlRod::new("reality_anchor"),
            semantic_filter: ControlRod::new("semantic_filter"),
            telemetry: Telemetry::default(),
        }
    }
}

impl ReactorControl {
    /// Scale a base generation count down by the damping rods, never below one.
    pub fn moderate_generation(&self, k: usize) -> usize {
        let damp = 0.4 * self.recursion_damper.depth
            + 0.4 * self.resource_governor.depth
            + 0.2 * self.semantic_filter.depth;
        ((k as f64 * (1.0 - damp)).floor() as usize).max(1)
    }

    /// Apply every telemetry rule that fires; rules are independent.
    pub fn auto_adjust(&mut self) {
        let t = self.telemetry;
        if t.temperature > 0.8 {
            self.resource_governor.insert(0.2);
        }
        if t.pressure > 0.7 {
            self.recursion_damper.insert(0.2);
        }
        if t.criticality > 1.2 {
            self.recursion_damper.insert(0.2);
            self.semantic_filter.insert(0.1);
        }
        if t.criticality < 0.8 {
            self.recursion_damper.withdraw(0.1);
            self.resource_governor.withdraw(0.05);
        }
        debug!(telemetry = ?t, rods = ?self.rod_depths(), "rods adjusted");
    }

    /// Drive every damping rod fully in. The reality anchor is left alone.
    pub fn insert_all(&mut self) {
        self.recursion_damper.force(1.0);
        self.resource_governor.force(1.0);
        self.semantic_filter.force(1.0);
    }

    pub fn rod_depths(&self) -> RodDepths {
        RodDepths {
            recursion_damper: self.recursion_damper.depth,
            resource_governor: self.resource_governor.depth,
            reality_anchor: self.reality_anchor.depth,
            semantic_filter: self.semantic_filter.depth,
        }
    }
}

/// Snapshot evaluated by the SCRAM monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReactorState {
    pub criticality: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub reality_corr: f64,
}

/// Emergency shutdown monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scram {
    pub enabled: bool,
    pub criticality_limit: f64,
    pub temperature_limit: f64,
    pub reality_correlation_floor: f64,
}

impl Default for Scram {
    fn default() -> Self {
        Self {
            enabled: true,
            criticality_limit: 1.8,
            temperature_limit: 0.95,
            reality_correlation_floor: 0.05,
        }
    }
}

impl Scram {
    /// Tighter limits for stress runs.
    pub fn stressed() -> Self {
        Self {
            criticality_limit: 1.3,
            temperature_limit: 0.6,
            ..Self::default()
        }
    }

    pub fn should_scram(&self, state: &ReactorState) -> bool {
        self.enabled
            && (state.criticality > self.criticality_limit
                || state.temperature > self.temperature_limit
                || state.reality_corr < self.reality_correlation_floor)
    }
}
