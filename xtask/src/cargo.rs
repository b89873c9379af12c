//! Shared runner for the cargo/probe-rs invocations the tasks chain together.

use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// Target triple of the STM32F407 (Cortex-M4F).
pub const TARGET: &str = "thumbv7em-none-eabihf";

/// probe-rs chip name.
pub const CHIP: &str = "STM32F407VGTx";

/// How a failing step affects the task.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Print the output and abort the task.
    Abort,
    /// Print a warning and carry on.
    Warn,
}

/// Run `program args...` as one labelled step, timing it.
///
/// Returns the captured output on success, or on a tolerated failure.
pub fn step(label: &str, program: &str, args: &[&str], on_failure: OnFailure) -> Result<Output> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run `{program} {}`", args.join(" ")))?;

    let elapsed = start.elapsed().as_secs_f64();
    if output.status.success() {
        println!("{}", format!("  ✓ {label} in {elapsed:.2}s").green());
    } else {
        match on_failure {
            OnFailure::Abort => {
                eprintln!("{}", format!("  ✗ {label} failed").red().bold());
                eprintln!();
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                eprintln!("{}", String::from_utf8_lossy(&output.stdout));
                anyhow::bail!("{label} failed");
            }
            OnFailure::Warn => {
                eprintln!("{}", format!("  ⚠ {label} reported problems").yellow().bold());
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            }
        }
    }
    println!();
    Ok(output)
}

/// Pull `N passed; M failed; ...` out of libtest output.
pub fn test_summary(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(|s| s.trim().to_string())
        .last()
        .unwrap_or_else(|| "(summary not available)".to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(stdout: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    #[test]
    fn summary_takes_last_result_line() {
        let out = output(
            "running 3 tests\n\
             test result: ok. 3 passed; 0 failed\n\
             running 1 test\n\
             test result: ok. 1 passed; 0 failed\n",
        );
        assert_eq!(test_summary(&out), "ok. 1 passed; 0 failed");
    }

    #[test]
    fn summary_missing() {
        assert_eq!(test_summary(&output("nothing here")), "(summary not available)");
    }
}
