//! Chain client verification harness
//!
//! Drives a Tron/EVM client CLI across its networks: read-only sweeps,
//! transfers and transaction monitoring, with per-step timeouts, tolerated
//! failures and transaction hashes threaded between dependent steps.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{Plan, ProcessRunner, Sequencer, Step, StepResult};
