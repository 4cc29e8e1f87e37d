//! CLI command definitions
//!
//! Defines the clap commands for the verification harness.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::harness::ChainFamily;

/// Where the configuration and plan come from
#[derive(Args, Debug, Clone, Default)]
pub struct PlanSource {
    /// Configuration file (default: the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// YAML plan file to run instead of the built-in four-stage plan
    #[arg(long)]
    pub plan: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the verification plan against the client
    Run {
        #[command(flatten)]
        source: PlanSource,

        /// Per-step timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip the inter-network delay and settle pauses
        #[arg(long)]
        no_delay: bool,

        /// Capture client output without echoing it
        #[arg(long, short)]
        quiet: bool,
    },

    /// Print the resolved plan without running anything
    Plan {
        #[command(flatten)]
        source: PlanSource,

        /// Output as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Extract a transaction hash from saved client output
    Extract {
        /// Hash format to look for
        #[arg(long, value_enum)]
        family: ChainFamily,

        /// File to scan (default: stdin)
        file: Option<PathBuf>,
    },
}
