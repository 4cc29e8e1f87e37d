//! Outcome classification and run statistics

use serde::Serialize;

/// Classified outcome of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exit code 0
    Ok,
    /// Non-zero exit on a tolerant step; the run continues
    Skip,
    /// Non-zero exit on a required step; the run aborts
    Fail,
}

/// Classify a completion code under the step's tolerance flag
pub fn classify(code: i32, tolerant: bool) -> Outcome {
    match (code, tolerant) {
        (0, _) => Outcome::Ok,
        (_, true) => Outcome::Skip,
        (_, false) => Outcome::Fail,
    }
}

/// Running counters, updated exactly once per executed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub ok: usize,
    pub fail: usize,
    pub skip: usize,
}

impl RunStats {
    /// Record an outcome, keeping `total == ok + fail + skip`
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Ok => self.ok += 1,
            Outcome::Skip => self.skip += 1,
            Outcome::Fail => self.fail += 1,
        }
        debug_assert_eq!(self.total, self.ok + self.fail + self.skip);
    }

    /// Classify and record in one step
    pub fn classify_and_record(&mut self, code: i32, tolerant: bool) -> Outcome {
        let outcome = classify(code, tolerant);
        self.record(outcome);
        outcome
    }
}
