use anyhow::Result;
use colored::Colorize;

use crate::cargo::{step, OnFailure, CHIP, TARGET};

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode)...").cyan().bold()
    );
    println!();

    let mut build = vec!["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"];
    if release {
        build.push("--release");
    }
    step("Build", "cargo", &build, OnFailure::Abort)?;

    let binary = format!("target/{TARGET}/{mode}/firmware");
    show_binary_size(&binary);

    println!("{}", format!("📡 Flashing to {CHIP}...").cyan().bold());
    step(
        "Flash",
        "probe-rs",
        &["download", "--chip", CHIP, "--probe-index", "0", &binary],
        OnFailure::Abort,
    )
    .map_err(|e| {
        e.context("check that the probe is connected and the board is powered (cargo install probe-rs-tools)")
    })?;

    println!("{}", "Sensor Hub is running on hardware.".bold());
    println!(
        "   {}",
        format!("Use 'probe-rs attach --chip {CHIP} {binary}' to view RTT logs").dimmed()
    );
    println!();

    Ok(())
}

fn show_binary_size(binary: &str) {
    let Ok(out) = std::process::Command::new("rust-size").args([binary, "-A"]).output() else {
        println!("   {}", "rust-size not found (cargo install cargo-binutils)".dimmed());
        println!();
        return;
    };
    if out.status.success() {
        println!("{}", "📊 Binary size:".cyan());
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            println!("   {}", line.dimmed());
        }
        println!();
    }
}
