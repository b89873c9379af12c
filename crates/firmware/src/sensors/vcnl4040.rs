//! VCNL4040 proximity + ambient light sensor.
//!
//! Reference: Vishay VCNL4040 datasheet (doc. 84274). Every register is
//! 16 bits wide, transferred low byte first.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::InitError;
use crate::error::ConfigurationFault;

/// 7-bit I2C address (fixed).
pub const ADDRESS: u8 = 0x60;
/// ALS_CONF: ALS integration time, interrupt, shutdown.
pub const REG_ALS_CONF: u8 = 0x00;
/// PS_CONF1 (low) / PS_CONF2 (high): duty, integration time, shutdown.
pub const REG_PS_CONF1_2: u8 = 0x03;
/// PS_CONF3 (low) / PS_MS (high): LED current.
pub const REG_PS_CONF3_MS: u8 = 0x04;
/// PS output.
pub const REG_PS_DATA: u8 = 0x08;
/// ALS output.
pub const REG_ALS_DATA: u8 = 0x09;
/// Device ID.
pub const REG_DEVICE_ID: u8 = 0x0C;
/// Expected [`REG_DEVICE_ID`] contents.
pub const DEVICE_ID: u16 = 0x0186;

/// ALS_IT = 160 ms, ALS_SD = 0 (powered).
pub const ALS_CONF_IT_160MS: u8 = 0x01 << 6;
/// PS_SD = 0, duty 1/40, 1T integration, 12-bit output.
pub const PS_CONF1_ENABLE: u8 = 0x00;
/// LED_I = 120 mA.
pub const PS_MS_LED_120MA: u8 = 0x03;
/// First conversion completes within one ALS integration period.
pub const STARTUP_DELAY_MS: u32 = 50;

fn write16<I: I2c>(
    i2c: &mut I,
    address: u8,
    reg: u8,
    low: u8,
    high: u8,
) -> Result<(), InitError<I::Error>> {
    i2c.write(address, &[reg, low, high])
        .map_err(InitError::Bus)
}

fn read16<I: I2c>(i2c: &mut I, address: u8, reg: u8) -> Result<u16, InitError<I::Error>> {
    let mut buf = [0u8; 2];
    i2c.write_read(address, &[reg], &mut buf)
        .map_err(InitError::Bus)?;
    Ok(u16::from_le_bytes(buf))
}

/// Check the ID, power up ALS (160 ms) and PS (120 mA LED).
///
/// # Errors
///
/// Bus failure, or [`ConfigurationFault::WrongDeviceId`].
pub fn init<I: I2c, D: DelayNs>(
    i2c: &mut I,
    delay: &mut D,
    address: u8,
) -> Result<(), InitError<I::Error>> {
    let id = read16(i2c, address, REG_DEVICE_ID)?;
    if id != DEVICE_ID {
        return Err(ConfigurationFault::WrongDeviceId {
            expected: DEVICE_ID,
            found: id,
        }
        .into());
    }
    write16(i2c, address, REG_ALS_CONF, ALS_CONF_IT_160MS, 0x00)?;
    write16(i2c, address, REG_PS_CONF1_2, PS_CONF1_ENABLE, 0x00)?;
    write16(i2c, address, REG_PS_CONF3_MS, 0x00, PS_MS_LED_120MA)?;
    delay.delay_ms(STARTUP_DELAY_MS);
    Ok(())
}

/// ALS or PS counts from a 2-byte little-endian burst.
pub fn decode_counts(raw: &[u8]) -> Option<u16> {
    match raw {
        [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}
