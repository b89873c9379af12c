//! Sensor Hub Firmware - Main Entry Point
//!
//! Hardware-only entry point for STM32F407VG.

#![no_std]
#![no_main]

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::time::Hertz;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Delay, Duration, Timer};
use platform::dma_safety::MAX_READ_LEN;
use platform::{Clock, EmbassyClock, RecoveryTiming};

use firmware::acquisition::{
    service_detached, AcquisitionConfig, AcquisitionEngine, DevicePlan, SharedEngine,
};
use firmware::bus::BusHandle;
use firmware::hal::stm32::{Stm32I2c, Stm32Lines};
use firmware::hal::{I2C_BUS_HZ, SERVICE_INTERVAL_MS};
use firmware::sensors;

use defmt_rtt as _;
use panic_probe as _;

bind_interrupts!(struct Irqs {
    I2C1_EV => i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => i2c::ErrorInterruptHandler<peripherals::I2C1>;
});

type Bus = BusHandle<Stm32I2c, Stm32Lines, Delay>;

static ENGINE: SharedEngine = Mutex::new(RefCell::new(None));

/// Owns the bus. Every awaited transfer is one completion or error
/// interrupt delivered to the engine; maintenance runs between transfers.
#[embassy_executor::task]
async fn acquisition_task(mut bus: Bus) {
    let clock = EmbassyClock;
    let mut next_service = 0u64;

    loop {
        let now = clock.now_ms();
        if now >= next_service {
            next_service = now.saturating_add(SERVICE_INTERVAL_MS);
            // Recovery can hold the bus for tens of milliseconds; it runs
            // outside the critical section.
            let _ = service_detached(&ENGINE, &mut bus, now);
            ENGINE.lock(|cell| {
                if let Some(engine) = cell.borrow_mut().as_mut() {
                    if !engine.is_in_flight() {
                        let _ = engine.start_sweep(&mut bus, now);
                    }
                }
            });
        }

        let Some(request) = bus.peripheral_mut().take_request() else {
            Timer::after(Duration::from_millis(1)).await;
            continue;
        };

        let mut landed = [0u8; MAX_READ_LEN];
        let outcome = bus.peripheral_mut().run(request).await.map(|data| {
            let n = data.len().min(MAX_READ_LEN);
            if let (Some(dst), Some(src)) = (landed.get_mut(..n), data.get(..n)) {
                dst.copy_from_slice(src);
            }
            n
        });

        let now = clock.now_ms();
        ENGINE.lock(|cell| {
            if let Some(engine) = cell.borrow_mut().as_mut() {
                match outcome {
                    Ok(n) => engine.on_transfer_complete(&mut bus, landed.get(..n).unwrap_or(&[]), now),
                    Err(code) => engine.on_transfer_error(&mut bus, code, now),
                }
            }
        });
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("{=str} v{=str}", platform::config::APP_NAME, platform::config::APP_VERSION);
    defmt::info!("Initializing STM32F407VG (Cortex-M4 @ 168 MHz)");

    let p = embassy_stm32::init(firmware::boot::build_embassy_config());

    let mut watchdog =
        embassy_stm32::wdg::IndependentWatchdog::new(p.IWDG, firmware::boot::init_watchdog_config());
    watchdog.unleash();
    defmt::info!(
        "IWDG watchdog armed: timeout={=u32}ms",
        firmware::boot::WATCHDOG_TIMEOUT_MS
    );

    let mut i2c = I2c::new(
        p.I2C1,
        p.PB6, // SCL
        p.PB9, // SDA
        Irqs,
        p.DMA1_CH6, // TX
        p.DMA1_CH0, // RX
        Hertz(I2C_BUS_HZ),
        Default::default(),
    );

    let mut plan = match DevicePlan::sensor_hub_default() {
        Ok(plan) => plan,
        Err(e) => {
            defmt::error!("device plan invalid: {}", e);
            DevicePlan::new()
        }
    };
    let report = sensors::bring_up(&mut i2c, &mut Delay, &plan);
    if let Err(e) = report.apply(&mut plan) {
        defmt::error!("bring-up report does not match plan: {}", e);
    }
    defmt::info!(
        "Sensors ready: {=usize} devices, {=usize} failed",
        plan.len(),
        report.failed.len()
    );

    match AcquisitionEngine::new(plan, AcquisitionConfig::default()) {
        Ok(engine) => ENGINE.lock(|cell| *cell.borrow_mut() = Some(engine)),
        Err(e) => defmt::error!("engine rejected plan: {}", e),
    }

    let bus = BusHandle::new(
        Stm32I2c::new(i2c),
        Stm32Lines,
        Delay,
        RecoveryTiming::default(),
    );
    if spawner.spawn(acquisition_task(bus)).is_err() {
        defmt::error!("acquisition task already running");
    }

    // Monitor loop: the consumer side. Reads only the front frame.
    let mut last_sweep = 0u32;
    loop {
        Timer::after(Duration::from_secs(1)).await;
        let (frame, stats, condition) = ENGINE.lock(|cell| {
            let cell = cell.borrow();
            match cell.as_ref() {
                Some(engine) => (
                    engine.front_frame(),
                    Some(engine.health_stats()),
                    Some(engine.health().condition()),
                ),
                None => (None, None, None),
            }
        });
        if let Some(frame) = frame {
            let fresh = frame.sweep.wrapping_sub(last_sweep);
            last_sweep = frame.sweep;
            defmt::info!(
                "sweep {=u32}: {=usize} fields, {=u32} sweeps/s",
                frame.sweep,
                frame.fields.len(),
                fresh
            );
        }
        if let (Some(stats), Some(condition)) = (stats, condition) {
            defmt::info!("bus {}: {}", condition, stats);
        }
        watchdog.pet();
    }
}
