//! Error types for the verification harness
//!
//! Step-level failures (non-zero exits, timeouts, missing binaries) are not
//! errors: they are carried in [`crate::harness::Exit`] and classified by the
//! sequencer. This type covers everything that prevents a run from starting
//! or that the sequencer reports when it aborts.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Errors ===
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    // === Run Errors ===
    #[error("Step '{step}' failed on network '{network}' (exit code {code})")]
    StepFailed {
        network: String,
        step: String,
        code: i32,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid plan file: {0}")]
    PlanParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a launch error for the given program
    pub fn launch(program: &str, source: io::Error) -> Self {
        Self::Launch {
            program: program.to_string(),
            source,
        }
    }

    /// Create a step failure error
    pub fn step_failed(network: &str, step: &str, code: i32) -> Self {
        Self::StepFailed {
            network: network.to_string(),
            step: step.to_string(),
            code,
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_message_names_program() {
        let err = Error::launch(
            "cargo",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        let msg = err.to_string();
        assert!(msg.contains("'cargo'"), "{msg}");
        assert!(msg.contains("No such file"), "{msg}");
    }

    #[test]
    fn test_step_failed_message_is_qualified() {
        let err = Error::step_failed("mainnet", "tron-balance", 1);
        assert_eq!(
            err.to_string(),
            "Step 'tron-balance' failed on network 'mainnet' (exit code 1)"
        );
    }
}
