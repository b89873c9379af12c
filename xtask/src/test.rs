use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{step, test_summary, OnFailure};

/// Integration test binaries under `crates/firmware/tests/`.
const INTEGRATION_TESTS: &[&str] = &[
    "integration_acquisition",
    "integration_recovery",
    "arch_boundaries",
];

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        let out = step(
            "Unit tests",
            "cargo",
            &["test", "--lib", "--workspace"],
            OnFailure::Abort,
        )?;
        println!("    {}", test_summary(&out).dimmed());
    }

    if !unit_only {
        let mut args = vec!["test", "-p", "firmware"];
        for name in INTEGRATION_TESTS {
            args.push("--test");
            args.push(*name);
        }
        let out = step("Integration tests", "cargo", &args, OnFailure::Abort)?;
        println!("    {}", test_summary(&out).dimmed());
    }

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
