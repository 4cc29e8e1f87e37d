//! CLI command handling
//!
//! Dispatches CLI commands to the harness and formats output.

use std::path::Path;

use colored::Colorize;
use tokio::io::AsyncReadExt;

use crate::commands::{Commands, PlanSource};
use crate::common::config::{Config, Credential, EVM_KEY_ENV, TRON_KEY_ENV};
use crate::common::{Error, Result};
use crate::harness::{Plan, ProcessRunner, Sequencer};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            source,
            timeout,
            no_delay,
            quiet,
        } => {
            let mut config = Config::load(source.config.as_deref())?;
            if let Some(secs) = timeout {
                config.timeouts.step_secs = secs;
            }
            config.validate()?;

            let mut plan = load_plan(&source, &config)?;
            if no_delay {
                plan = plan.without_delays();
            }

            if which::which(&config.client.program).is_err() {
                tracing::warn!(
                    "client program '{}' not found on PATH; steps will fail to launch",
                    config.client.program
                );
            }

            let mut runner = ProcessRunner::from_config(&config);
            if quiet {
                runner = runner.quiet();
            }

            let mut sequencer = Sequencer::new(runner);
            let report = sequencer.run(&plan).await;
            if let Some(err) = report.error() {
                tracing::error!("{}", err);
            }
            Ok(report.exit_code())
        }

        Commands::Plan { source, json } => {
            let config = Config::load(source.config.as_deref())?;
            let plan = load_plan(&source, &config)?.redacted();

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(0);
            }

            print_client(&config);
            if source.plan.is_none() {
                print_credential(TRON_KEY_ENV, config.tron_credential().as_ref());
                print_credential(EVM_KEY_ENV, config.evm_credential().as_ref());
            }
            let yaml = serde_yaml::to_string(&plan)
                .map_err(|e| Error::Internal(format!("Failed to render plan: {}", e)))?;
            println!("\n{}", yaml);
            Ok(0)
        }

        Commands::Extract { family, file } => {
            let text = read_input(file.as_deref()).await?;
            match family.extract_hash(&text) {
                Some(hash) => {
                    println!("{}", hash);
                    Ok(0)
                }
                None => {
                    eprintln!("No {} transaction hash found", family);
                    Ok(1)
                }
            }
        }
    }
}

/// The plan file if one was given, otherwise the built-in plan
fn load_plan(source: &PlanSource, config: &Config) -> Result<Plan> {
    match &source.plan {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading plan file");
            Plan::from_yaml_file(path)
        }
        None => {
            tracing::info!("using built-in plan");
            Ok(Plan::builtin(config))
        }
    }
}

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_read(path, e)),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}

fn print_client(config: &Config) {
    let client = &config.client;
    let mut invocation = vec![client.program.clone()];
    invocation.extend(client.args.iter().cloned());
    invocation.push("<step>".to_string());

    println!("{} {}", "Client:".cyan(), invocation.join(" "));
    match which::which(&client.program) {
        Ok(path) => println!("  {} {}", "✓".green(), path.display().to_string().dimmed()),
        Err(_) => println!("  {} not found on PATH", "✗".red()),
    }
    if let Some(dir) = &client.workdir {
        println!("  Workdir: {}", dir.display().to_string().dimmed());
    }
    println!(
        "  Timeout: {}s per step (drain join {}s)",
        config.timeouts.step_secs, config.timeouts.drain_join_secs
    );
}

fn print_credential(var: &str, credential: Option<&Credential>) {
    match credential {
        Some(cred) => println!("{} {} from {}", "Key:".cyan(), var, cred.source),
        None => println!("{} {} {}", "Key:".cyan(), var, "not available".yellow()),
    }
}
