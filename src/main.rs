//! chain-verify - end-to-end verification of a multi-network chain client
//!
//! Runs the client's subcommands network by network, streams their output,
//! and exits non-zero on the first required step that fails.

use std::path::PathBuf;

use chain_verify::common::logging::{self, LogTarget};
use chain_verify::{cli, commands::Commands};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chain-verify", about = "End-to-end verification harness for the chain client")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write a debug log to the data directory
    #[arg(long, global = true)]
    log: bool,

    /// Also write a debug log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let target = match (cli.log_file, cli.log) {
        (Some(path), _) => LogTarget::File(path),
        (None, true) => LogTarget::DataDir,
        (None, false) => LogTarget::Stderr,
    };
    let guard = logging::init_cli(cli.verbose, &target);

    let code = match cli::dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
