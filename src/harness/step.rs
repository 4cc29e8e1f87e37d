//! Step and result types

use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::extract;

/// Completion code reported for timeouts, launch failures and signal deaths
pub const SENTINEL_CODE: i32 = -1;

/// Chain family a stage targets
///
/// The family decides which environment variable selects the network and
/// which identifier format the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Tron: bare 64-hex transaction ids
    Tron,
    /// EVM chains: `0x`-prefixed 64-hex transaction hashes
    Evm,
}

impl ChainFamily {
    /// Environment variable the client reads the network name from
    pub fn network_var(self) -> &'static str {
        match self {
            Self::Tron => "TRON_NETWORK",
            Self::Evm => "EVM_NETWORK",
        }
    }

    /// Extract this family's transaction identifier from client output
    pub fn extract_hash(self, output: &str) -> Option<String> {
        match self {
            Self::Tron => extract::tron_tx_hash(output),
            Self::Evm => extract::evm_tx_hash(output),
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tron => f.write_str("Tron"),
            Self::Evm => f.write_str("EVM"),
        }
    }
}

/// One client invocation with a fully resolved environment overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Step name, usually the subcommand
    pub name: String,
    /// Network the step runs against
    pub network: String,
    /// Chain family of the network
    pub family: ChainFamily,
    /// Subcommand tokens appended to the client invocation
    pub command: Vec<String>,
    /// Variables layered over the ambient environment; these win on conflict
    pub env: BTreeMap<String, String>,
    /// Whether a failure is tolerated (counted as skip) instead of aborting
    pub tolerant: bool,
}

impl Step {
    /// Human-readable label, e.g. `[mainnet] tron-balance`
    pub fn label(&self) -> String {
        format!("[{}] {}", self.network, self.name)
    }
}

/// How a step's process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Normal exit with a status code
    Code(i32),
    /// Terminated by a signal without a status code; `None` when the signal is unknown
    Signaled { signal: Option<i32> },
    /// Killed after exceeding the step timeout
    TimedOut { secs: u64 },
    /// The program could not be started
    LaunchFailed { message: String },
}

impl Exit {
    /// Map a finished process's status
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;
        Self::Signaled { signal }
    }

    /// Integer completion code: 0 on success, the negated signal number for a
    /// signal death, [`SENTINEL_CODE`] when there is no exit status at all
    pub fn code(&self) -> i32 {
        match self {
            Self::Code(code) => *code,
            Self::Signaled { signal: Some(signal) } => -signal,
            Self::Signaled { signal: None } | Self::TimedOut { .. } | Self::LaunchFailed { .. } => {
                SENTINEL_CODE
            }
        }
    }

    pub fn success(&self) -> bool {
        self.code() == 0
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {}", code),
            Self::Signaled { signal: Some(signal) } => write!(f, "terminated by signal {}", signal),
            Self::Signaled { signal: None } => f.write_str("terminated by signal"),
            Self::TimedOut { secs } => write!(f, "timed out after {}s", secs),
            Self::LaunchFailed { message } => f.write_str(message),
        }
    }
}

/// Outcome of running one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub exit: Exit,
    /// Captured stdout and stderr, newline-terminated lines in arrival order
    pub output: String,
    pub elapsed: Duration,
}

impl StepResult {
    pub fn code(&self) -> i32 {
        self.exit.code()
    }
}
