//! MA'AT - ledgered hypothesis testing with a recursive, self-observing reactor
//!
//! The workspace crates do the work; this crate wires them into a runnable
//! session for the `maat` binary.

pub mod launcher;

pub use launcher::{launch, resolve_config, LaunchOptions, LaunchSummary};
