//! Verification harness engine
//!
//! Drives the client binary step by step: the [`process`] runner executes
//! one invocation, [`extract`] pulls transaction hashes out of its output,
//! [`stats`] classifies the result, and the [`sequencer`] walks the
//! [`plan`] stage by stage, aborting on the first required failure.

pub mod executor;
pub mod extract;
pub mod plan;
pub mod process;
pub mod report;
pub mod sequencer;
pub mod stats;
pub mod step;

pub use executor::StepExecutor;
pub use plan::{FlowStage, NetworkSet, Plan, Stage, SweepStage, SweepStep};
pub use process::{ClientCommand, ProcessRunner, StepRunner};
pub use sequencer::{RunReport, RunStatus, Sequencer};
pub use stats::{classify, Outcome, RunStats};
pub use step::{ChainFamily, Exit, Step, StepResult, SENTINEL_CODE};
