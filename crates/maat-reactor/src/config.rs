//! Reactor configuration
//!
//! All tunables in one place. Loaded from TOML at startup, falls back to
//! defaults when no config file exists.

use crate::control::Scram;
use maat_core::{GateThresholds, Result};
use maat_engine::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Seed for the inner engine and the external signal; the outer engine uses seed + 1000.
    pub seed: u64,
    pub window: WindowConfig,
    pub gates: GatesConfig,
    pub scram: Scram,
    pub policy: PolicySection,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            window: WindowConfig::default(),
            gates: GatesConfig::default(),
            scram: Scram::default(),
            policy: PolicySection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples per external window.
    pub external: usize,
    /// Inner R receipts folded into the meta-series.
    pub meta: usize,
    /// Maximum meta-series samples handed to the outer engine.
    pub outer_tail: usize,
    /// R decisions per engine counted for criticality.
    pub criticality_lookback: usize,
    /// Hypotheses per cycle before rod moderation.
    pub base_generation: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            external: 64,
            meta: 32,
            outer_tail: 64,
            criticality_lookback: 3,
            base_generation: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesConfig {
    /// R hemisphere (exploratory).
    pub right: GateThresholds,
    /// L hemisphere (conservative).
    pub left: GateThresholds,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            right: GateThresholds::exploratory(),
            left: GateThresholds::conservative(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub enabled: bool,
    pub target_accept_min: f64,
    pub target_accept_max: f64,
    pub learning_rate: f64,
    pub cooldown: u32,
}

impl Default for PolicySection {
    fn default() -> Self {
        let p = PolicyConfig::default();
        Self {
            enabled: false,
            target_accept_min: p.target_accept_min,
            target_accept_max: p.target_accept_max,
            learning_rate: p.learning_rate,
            cooldown: p.cooldown,
        }
    }
}

impl PolicySection {
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            target_accept_min: self.target_accept_min,
            target_accept_max: self.target_accept_max,
            learning_rate: self.learning_rate,
            cooldown: self.cooldown,
        }
    }
}

impl ReactorConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Same config with the stress-run SCRAM limits.
    pub fn stressed(mut self) -> Self {
        self.scram = Scram {
            enabled: self.scram.enabled,
            ..Scram::stressed()
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = ReactorConfig::default();
        let text = config.to_toml();
        assert!(text.contains("[gates.right]"));
        assert_eq!(ReactorConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ReactorConfig::from_toml("seed = 7\n[scram]\ncriticality_limit = 1.5\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.scram.criticality_limit, 1.5);
        assert_eq!(config.scram.temperature_limit, 0.95);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn missing_or_broken_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(ReactorConfig::load(&tmp.path().join("none.toml")), ReactorConfig::default());

        let bad = tmp.path().join("bad.toml");
        std::fs::write(&bad, "seed = \"not a number\"").unwrap();
        assert_eq!(ReactorConfig::load(&bad), ReactorConfig::default());
        assert!(ReactorConfig::from_toml("seed = \"x\"").is_err());
    }

    #[test]
    fn stress_lowers_limits() {
        let config = ReactorConfig::default().stressed();
        assert_eq!(config.scram.criticality_limit, 1.3);
        assert_eq!(config.scram.temperature_limit, 0.6);
        assert_eq!(config.scram.reality_correlation_floor, 0.05);
    }
}
