//! Plan sequencer
//!
//! Runs stages strictly in order, one step at a time. Each executed step is
//! classified and counted exactly once; the first required step that fails
//! aborts the whole run. Transaction hashes extracted from producer steps are
//! threaded into the monitor step of the same network and never outlive it.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::common::Error;

use super::executor::StepExecutor;
use super::plan::{FlowStage, Plan, Stage, SweepStage};
use super::process::StepRunner;
use super::report;
use super::stats::{Outcome, RunStats};
use super::step::{Step, StepResult};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed {
        network: String,
        step: String,
        code: i32,
    },
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunReport {
    /// Process exit code: 0 when every stage passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Failed { .. } => 1,
        }
    }

    /// The abort as an error, if the run failed
    pub fn error(&self) -> Option<Error> {
        match &self.status {
            RunStatus::Passed => None,
            RunStatus::Failed {
                network,
                step,
                code,
            } => Some(Error::step_failed(network, step, *code)),
        }
    }
}

/// Executes a [`Plan`] against a [`StepRunner`]
pub struct Sequencer<R> {
    executor: StepExecutor<R>,
    stats: RunStats,
}

impl<R: StepRunner> Sequencer<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: StepExecutor::new(runner),
            stats: RunStats::default(),
        }
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Run every stage of the plan and print the summary
    pub async fn run(&mut self, plan: &Plan) -> RunReport {
        let started = Instant::now();
        self.stats = RunStats::default();

        let status = match self.run_stages(plan).await {
            Ok(()) => RunStatus::Passed,
            Err(status) => status,
        };

        let report = RunReport {
            status,
            stats: self.stats,
            elapsed: started.elapsed(),
        };
        report::summary(&report.stats, report.elapsed, report.exit_code() == 0);
        report
    }

    async fn run_stages(&mut self, plan: &Plan) -> Result<(), RunStatus> {
        for stage in &plan.stages {
            match stage {
                Stage::Sweep(sweep) => self.run_sweep(sweep).await?,
                Stage::Flow(flow) => self.run_flow(flow).await?,
            }
        }
        Ok(())
    }

    async fn run_sweep(&mut self, stage: &SweepStage) -> Result<(), RunStatus> {
        report::section(&stage.title);

        for (i, network) in stage.networks.iter().enumerate() {
            if i > 0 {
                pause(stage.network_delay_secs, "network delay").await;
            }
            report::section(&format!("{}: {}", stage.family, network));

            for spec in &stage.steps {
                if let Some(settle) = &spec.settle {
                    if settle.on.contains(network) {
                        pause(settle.secs, "settle").await;
                    }
                }
                let step = stage.step(spec, network);
                self.run_step(&step).await?;
            }
        }

        report::stage_passed(&stage.title);
        Ok(())
    }

    async fn run_flow(&mut self, stage: &FlowStage) -> Result<(), RunStatus> {
        report::section(&stage.title);

        if let Some(reason) = &stage.skip_reason {
            report::info(reason);
            tracing::info!(stage = %stage.title, "stage skipped");
            return Ok(());
        }

        for network in &stage.networks {
            report::section(&format!("{}: {}", stage.family, network));

            let mut tx_hash = None;
            for producer in &stage.producers {
                let step = stage.producer_step(network, producer);
                let result = self.run_step(&step).await?;
                if let Some(hash) = stage.family.extract_hash(&result.output) {
                    tracing::debug!(step = %producer, hash = %hash, "extracted transaction hash");
                    tx_hash = Some(hash);
                }
            }

            match tx_hash {
                Some(hash) => {
                    let step = stage.monitor_step(network, &hash);
                    self.run_step(&step).await?;
                }
                None => report::warning(&format!(
                    "[{}] no {} transaction hash found; skipping {}",
                    network, stage.family, stage.monitor
                )),
            }
        }

        report::stage_passed(&stage.title);
        Ok(())
    }

    /// Execute, classify and count one step
    async fn run_step(&mut self, step: &Step) -> Result<StepResult, RunStatus> {
        let result = self.executor.execute(step).await;

        match self.stats.classify_and_record(result.code(), step.tolerant) {
            Outcome::Ok => {
                report::step_ok(step);
                Ok(result)
            }
            Outcome::Skip => {
                tracing::warn!(step = %step.label(), exit = %result.exit, "tolerated failure");
                report::step_skipped(step, &result.exit);
                Ok(result)
            }
            Outcome::Fail => {
                tracing::error!(step = %step.label(), exit = %result.exit, "step failed");
                report::step_failed(step, &result.exit);
                Err(RunStatus::Failed {
                    network: step.network.clone(),
                    step: step.name.clone(),
                    code: result.code(),
                })
            }
        }
    }
}

async fn pause(secs: u64, reason: &str) {
    if secs == 0 {
        return;
    }
    tracing::debug!("{}: sleeping {}s", reason, secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
