use anyhow::{Context, Result};
use colored::Colorize;
use firmware::acquisition::DevicePlan;
use platform::{HealthPolicy, RecoveryTiming};

pub fn run() -> Result<()> {
    let plan = DevicePlan::sensor_hub_default().context("default device plan is invalid")?;

    println!();
    println!(
        "{}",
        format!(
            "📋 {} device plan: {} devices, {} reads per sweep",
            platform::config::APP_NAME,
            plan.len(),
            plan.step_count()
        )
        .cyan()
        .bold()
    );
    println!();
    println!(
        "   {:>4}  {:>6}  {:<14}  {:<12}  {:>4}  {:>3}",
        "step", "device", "kind", "route", "reg", "len"
    );

    for index in 0..plan.step_count() {
        let Some(step) = plan.step(index) else {
            continue;
        };
        let kind = plan
            .devices()
            .get(step.device)
            .map_or("?", |d| d.kind.as_str());
        let route = step.route.map_or_else(
            || "direct".to_string(),
            |r| format!("{:#04x}/ch{}", r.mux.get(), r.channel.get()),
        );
        println!(
            "   {:>4}  {:>#6x}  {:<14}  {:<12}  {:>#4x}  {:>3}",
            index,
            step.address.get(),
            kind,
            route,
            step.read.register,
            step.read.len
        );
    }

    let health = HealthPolicy::default();
    let timing = RecoveryTiming::default();
    println!();
    println!("{}", "🩺 Health policy".cyan().bold());
    println!("   failure threshold     {}", health.failure_threshold);
    println!("   success decay         {}", health.success_decay_threshold);
    println!(
        "   probe                 {} every {} ms",
        health.probe_address, health.probe_interval_ms
    );
    println!();
    println!("{}", "🔧 Recovery timing".cyan().bold());
    println!(
        "   bus recovery          {} pulses, 1 STOP",
        timing.recovery_pulses
    );
    println!(
        "   forced reset          {} pulses, {} STOPs, {} ms hold",
        timing.forced_pulses, timing.forced_stop_attempts, timing.forced_reset_hold_ms
    );
    println!(
        "   half period / settle  {} us / {} ms",
        timing.pulse_half_period_us, timing.settle_ms
    );
    println!();

    Ok(())
}
