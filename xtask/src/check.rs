use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{step, OnFailure, TARGET};

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking sensor hub builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    step(
        "Hardware target (STM32F407)",
        "cargo",
        &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
        OnFailure::Abort,
    )?;
    step(
        "Host build with tracing (std)",
        "cargo",
        &["check", "-p", "firmware", "--features", "std"],
        OnFailure::Abort,
    )?;
    step(
        "Platform crate (no_std)",
        "cargo",
        &["check", "-p", "platform", "--target", TARGET, "--no-default-features"],
        OnFailure::Abort,
    )?;
    step(
        "Clippy",
        "cargo",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    let fmt = step("Formatting", "cargo", &["fmt", "--all", "--check"], OnFailure::Warn)?;
    if !fmt.status.success() {
        eprintln!("     Run 'cargo fmt --all' to fix");
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
