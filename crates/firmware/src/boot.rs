//! Hardware boot sequence for the sensor hub.
//!
//! Initialization order (MUST be respected; later steps assume earlier ones):
//!   1. Clock tree: HSE 8 MHz → PLL → 168 MHz SYSCLK, APB1 42 MHz
//!   2. IWDG: arm the independent watchdog
//!   3. I2C1: embassy driver on PB6/PB9 with DMA1 streams 6/0
//!   4. Sensor bring-up: blocking init of every device in the plan
//!   5. Engine: install into the shared cell, hand the bus to the acquisition task
//!   6. Embassy executor: spawn tasks
//!
//! The I2C1 timing registers written by recovery assume the APB1 clock set
//! here; [`crate::hal::APB1_HZ`] must match [`build_embassy_config`].

/// Ordered list of boot sequence steps for documentation and testing.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. RCC: HSE 8 MHz, PLL to 168 MHz SYSCLK, APB1 42 MHz",
    "2. IWDG: arm watchdog before any blocking bus access",
    "3. I2C1: 400 kHz on PB6/PB9, DMA1 stream 6 TX / stream 0 RX",
    "4. Sensors: bring-up over blocking I2C, drop failed devices from plan",
    "5. Engine: install shared engine, move bus handle into acquisition task",
    "6. Embassy executor: spawn tasks",
];

/// Watchdog timeout. Bring-up of eleven sensors plus one Forced Reset takes
/// well under a second.
pub const WATCHDOG_TIMEOUT_MS: u32 = 4_000;

/// HSE crystal frequency.
pub const HSE_HZ: u32 = 8_000_000;

/// SYSCLK after PLL lock.
pub const SYSCLK_HZ: u32 = 168_000_000;

/// PLL settings as `(M, N, P, Q)`: VCO = HSE / M × N, SYSCLK = VCO / P.
pub const PLL_MNPQ: (u32, u32, u32, u32) = (4, 168, 2, 7);

/// SYSCLK implied by [`PLL_MNPQ`].
pub fn pll_sysclk_hz() -> Option<u32> {
    let (m, n, p, _) = PLL_MNPQ;
    HSE_HZ.checked_div(m)?.checked_mul(n)?.checked_div(p)
}

/// Watchdog timeout in the unit `IndependentWatchdog::new` takes.
pub fn init_watchdog_config() -> u32 {
    WATCHDOG_TIMEOUT_MS.saturating_mul(1_000)
}

/// Build the `embassy_stm32::Config` for the F407 clock tree.
///
/// # Clock Tree (HSE → 168 MHz core)
///
/// HSE (8 MHz) / M(4) = 2 MHz → × N(168) = 336 MHz VCO
/// PLL_P: DIV2 → 168 MHz (sys)
/// PLL_Q: DIV7 → 48 MHz (USB/SDIO, unused)
/// AHB DIV1 → 168 MHz, APB1 DIV4 → 42 MHz, APB2 DIV2 → 84 MHz
#[cfg(feature = "hardware")]
pub fn build_embassy_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;
    use embassy_stm32::time::Hertz;

    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(HSE_HZ),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL168,
        divp: Some(PllPDiv::DIV2),
        divq: Some(PllQDiv::DIV7),
        divr: None,
    });
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config.rcc.sys = Sysclk::PLL1_P;
    config
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::hal::APB1_HZ;

    #[test]
    fn test_pll_reaches_168mhz() {
        assert_eq!(pll_sysclk_hz(), Some(SYSCLK_HZ));
    }

    #[test]
    fn test_apb1_matches_i2c_timing_assumption() {
        // APB1 prescaler is DIV4 in build_embassy_config().
        assert_eq!(SYSCLK_HZ / 4, APB1_HZ);
    }

    #[test]
    fn test_watchdog_armed_before_bus_access() {
        let iwdg = BOOT_SEQUENCE_STEPS
            .iter()
            .position(|s| s.contains("IWDG"))
            .unwrap();
        let sensors = BOOT_SEQUENCE_STEPS
            .iter()
            .position(|s| s.contains("Sensors"))
            .unwrap();
        assert!(iwdg < sensors);
    }

    #[test]
    fn test_watchdog_timeout_in_microseconds() {
        assert_eq!(init_watchdog_config(), 4_000_000);
    }
}
