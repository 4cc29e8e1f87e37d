//! Step executor: labels a step on the console and hands it to the runner

use super::process::StepRunner;
use super::report;
use super::step::{Step, StepResult};

/// Presentation wrapper around a [`StepRunner`]
#[derive(Debug)]
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: StepRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Print the step label, run it, and return the result unchanged
    pub async fn execute(&self, step: &Step) -> StepResult {
        report::step_label(&step.label());
        tracing::debug!(
            step = %step.name,
            network = %step.network,
            tolerant = step.tolerant,
            "executing step"
        );
        self.runner.run(step).await
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}
