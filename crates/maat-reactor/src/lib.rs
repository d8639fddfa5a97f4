//! MA'AT Reactor - recursive self-observation with control rods and SCRAM
//!
//! - `control`: rods, telemetry-driven adjustment, SCRAM monitor
//! - `config`: TOML-backed reactor configuration
//! - `reactor`: inner/outer engine composition and the cycle loop

pub mod config;
pub mod control;
pub mod reactor;

pub use config::{GatesConfig, PolicySection, ReactorConfig, WindowConfig};
pub use control::{ControlRod, ReactorControl, ReactorState, RodDepths, Scram, Telemetry};
pub use reactor::{CycleResult, CycleStatus, RecursiveReactor};
