//! Board binding for the STM32F407 sensor board.
//!
//! The constants and the timing calculation here are plain data so they are
//! tested on the host; [`stm32`] uses them to drive the real peripheral.
//!
//! | Signal | Pin  | Function  |
//! |--------|------|-----------|
//! | SCL    | PB6  | I2C1_SCL  |
//! | SDA    | PB9  | I2C1_SDA  |
//! | TX DMA | DMA1 stream 6, channel 1 | |
//! | RX DMA | DMA1 stream 0, channel 1 | |

#[cfg(feature = "hardware")]
pub mod stm32;

/// I2C1 bus clock.
pub const I2C_BUS_HZ: u32 = 400_000;

/// APB1 clock feeding I2C1 (168 MHz SYSCLK / 4).
pub const APB1_HZ: u32 = 42_000_000;

/// GPIOB pin number of SCL.
pub const SCL_PIN: usize = 6;

/// GPIOB pin number of SDA.
pub const SDA_PIN: usize = 9;

/// Upper bound on one register read, including clock stretching.
pub const TRANSFER_TIMEOUT_MS: u64 = 10;

/// Interval of the foreground maintenance tick (recovery, probe, watchdog).
pub const SERVICE_INTERVAL_MS: u64 = 100;

/// I2C v1 timing register values (RM0090 §27.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cTiming {
    /// CR2.FREQ: peripheral clock in MHz.
    pub freq_mhz: u8,
    /// CCR.CCR.
    pub ccr: u16,
    /// CCR.F_S: fast mode.
    pub fast_mode: bool,
    /// TRISE.
    pub trise: u8,
}

/// Register values for `bus_hz` given the APB clock, duty cycle 2:1 in fast
/// mode. `None` if the peripheral clock is outside 2..=50 MHz or the bus rate
/// is above 400 kHz.
pub fn i2c_timing(pclk_hz: u32, bus_hz: u32) -> Option<I2cTiming> {
    let freq_mhz = pclk_hz.checked_div(1_000_000)?;
    if !(2..=50).contains(&freq_mhz) || bus_hz == 0 || bus_hz > 400_000 {
        return None;
    }
    let fast_mode = bus_hz > 100_000;
    let (ccr, trise) = if fast_mode {
        // Tlow + Thigh = 3 × CCR × Tpclk; max rise time 300 ns.
        let ccr = pclk_hz.checked_div(bus_hz.checked_mul(3)?)?.max(1);
        (ccr, freq_mhz.checked_mul(300)?.checked_div(1000)?.checked_add(1)?)
    } else {
        // Tlow = Thigh = CCR × Tpclk; max rise time 1000 ns.
        let ccr = pclk_hz.checked_div(bus_hz.checked_mul(2)?)?.max(4);
        (ccr, freq_mhz.checked_add(1)?)
    };
    Some(I2cTiming {
        freq_mhz: u8::try_from(freq_mhz).ok()?,
        ccr: u16::try_from(ccr).ok()?,
        fast_mode,
        trise: u8::try_from(trise).ok()?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fast_mode_at_42mhz() {
        let t = i2c_timing(APB1_HZ, I2C_BUS_HZ).unwrap();
        assert_eq!(
            t,
            I2cTiming {
                freq_mhz: 42,
                ccr: 35,
                fast_mode: true,
                trise: 13
            }
        );
    }

    #[test]
    fn standard_mode_at_42mhz() {
        let t = i2c_timing(APB1_HZ, 100_000).unwrap();
        assert_eq!(t.ccr, 210);
        assert_eq!(t.trise, 43);
        assert!(!t.fast_mode);
    }

    #[test]
    fn out_of_range_clocks_rejected() {
        assert!(i2c_timing(1_000_000, 100_000).is_none());
        assert!(i2c_timing(84_000_000, 400_000).is_none());
        assert!(i2c_timing(APB1_HZ, 1_000_000).is_none());
    }
}
