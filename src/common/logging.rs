//! Logging and tracing configuration
//!
//! Diagnostics go to stderr through `tracing`, so they never interleave with
//! the operator-facing report and the streamed client output on stdout.
//! An optional file layer keeps a full debug trace of the run.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::paths;

/// Where the file layer should write, if anywhere
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// stderr only
    #[default]
    Stderr,
    /// stderr plus a daily-rolled file in the data directory
    DataDir,
    /// stderr plus an explicit file
    File(PathBuf),
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
///
/// The returned guard must be held until exit so buffered file logs are flushed.
pub fn init_cli(verbose: bool, target: &LogTarget) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("chain_verify=debug,info")
        } else {
            EnvFilter::new("chain_verify=info,warn")
        }
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter);

    let (file_layer, guard) = match file_appender(target) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new("chain_verify=debug,info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn file_appender(
    target: &LogTarget,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let appender = match target {
        LogTarget::Stderr => return None,
        LogTarget::DataDir => {
            let dir = paths::log_dir()?;
            if let Err(e) = std::fs::create_dir_all(&dir) {
                eprintln!("Warning: Could not create log directory: {}", e);
                return None;
            }
            tracing_appender::rolling::daily(dir, "run.log")
        }
        LogTarget::File(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            let name = path.file_name()?;
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Warning: Could not create log directory: {}", e);
                return None;
            }
            tracing_appender::rolling::never(dir, name)
        }
    };

    Some(tracing_appender::non_blocking(appender))
}
