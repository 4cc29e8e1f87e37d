//! Console presentation: banners, step markers and the final summary
//!
//! Everything here writes to stdout, interleaved with the live client output.

use std::time::Duration;

use colored::Colorize;

use super::stats::RunStats;
use super::step::{Exit, Step};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Section banner: a titled block between two rules
pub fn section(title: &str) {
    println!("\n{}", rule());
    println!("{}", title.bold());
    println!("{}", rule());
}

/// Per-step label printed before the client output
pub fn step_label(label: &str) {
    println!("\n{}", format!("--- {} ---", label).cyan());
}

pub fn step_ok(step: &Step) {
    println!("{} {}", "✓".green(), step.label().dimmed());
}

pub fn step_skipped(step: &Step, exit: &Exit) {
    println!(
        "{} {} failed ({}); tolerated, continuing",
        "⚠".yellow(),
        step.label(),
        exit
    );
}

pub fn step_failed(step: &Step, exit: &Exit) {
    println!(
        "{} {} {} failed ({})",
        "✗".red().bold(),
        step.family,
        step.label().red(),
        exit
    );
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn info(message: &str) {
    println!("{}", message);
}

pub fn stage_passed(title: &str) {
    println!("\n{} {}", "✓".green().bold(), format!("{} passed", title).green().bold());
}

/// Final statistics block
pub fn summary(stats: &RunStats, elapsed: Duration, passed: bool) {
    println!("\n{}", rule());
    println!("{}", "Summary".bold());
    println!("{}", rule());
    println!("Elapsed:             {:.1} s", elapsed.as_secs_f64());
    println!("Commands:            {}", stats.total);
    println!("Succeeded:           {}", stats.ok.to_string().green());
    println!("Failed:              {}", stats.fail.to_string().red());
    println!("Skipped (tolerated): {}", stats.skip.to_string().yellow());
    println!("{}", rule());
    if passed {
        println!("{}", "All networks verified".green().bold());
    } else {
        println!("{}", "Verification aborted".red().bold());
    }
    println!("{}", rule());
}
