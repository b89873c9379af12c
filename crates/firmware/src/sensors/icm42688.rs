//! ICM-42688-P 6-axis IMU.
//!
//! Reference: TDK InvenSense DS-000347. Sensor data registers are 16-bit
//! big-endian two's complement, laid out contiguously from TEMP_DATA1:
//!
//! ```text
//! 0x1D TEMP  0x1F ACCEL_X  0x21 ACCEL_Y  0x23 ACCEL_Z  0x25 GYRO_X  0x27 GYRO_Y  0x29 GYRO_Z
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::InitError;
use crate::acquisition::frame::MotionSample;
use crate::error::ConfigurationFault;

/// 7-bit I2C address with AP_AD0 low.
pub const ADDRESS: u8 = 0x68;
/// DEVICE_CONFIG: soft reset.
pub const REG_DEVICE_CONFIG: u8 = 0x11;
/// TEMP_DATA1: first byte of the sensor data block.
pub const REG_TEMP_DATA1: u8 = 0x1D;
/// ACCEL_DATA_X1.
pub const REG_ACCEL_DATA_X1: u8 = 0x1F;
/// GYRO_DATA_X1.
pub const REG_GYRO_DATA_X1: u8 = 0x25;
/// PWR_MGMT0.
pub const REG_PWR_MGMT0: u8 = 0x4E;
/// GYRO_CONFIG0: full scale + ODR.
pub const REG_GYRO_CONFIG0: u8 = 0x4F;
/// ACCEL_CONFIG0: full scale + ODR.
pub const REG_ACCEL_CONFIG0: u8 = 0x50;
/// WHO_AM_I.
pub const REG_WHO_AM_I: u8 = 0x75;
/// Expected [`REG_WHO_AM_I`] contents.
pub const WHO_AM_I: u8 = 0x47;

/// DEVICE_CONFIG.SOFT_RESET_CONFIG.
pub const SOFT_RESET: u8 = 0x01;
/// Gyro and accel both in low-noise mode.
pub const PWR_GYRO_ACCEL_LOW_NOISE: u8 = (0x03 << 2) | 0x03;
/// ±2000 dps, 1 kHz.
pub const GYRO_FS_2000DPS_1KHZ: u8 = 0x06;
/// ±16 g, 1 kHz.
pub const ACCEL_FS_16G_1KHZ: u8 = 0x06;
/// Soft reset completes within 1 ms; 10 ms leaves margin for the OTP reload.
pub const RESET_DELAY_MS: u32 = 10;

/// Temp + accel + gyro burst length.
pub const BURST_LEN: u8 = 14;

/// g per LSB at ±16 g.
pub const ACCEL_SCALE: f32 = 16.0 / 32768.0;
/// dps per LSB at ±2000 dps.
pub const GYRO_SCALE: f32 = 2000.0 / 32768.0;
/// LSB per °C of the die temperature sensor.
pub const TEMP_SENSITIVITY: f32 = 132.48;
/// Die temperature at raw 0.
pub const TEMP_OFFSET_C: f32 = 25.0;

fn write_reg<I: I2c>(
    i2c: &mut I,
    address: u8,
    reg: u8,
    value: u8,
) -> Result<(), InitError<I::Error>> {
    i2c.write(address, &[reg, value]).map_err(InitError::Bus)
}

/// Verify WHO_AM_I, soft-reset, enable both sensors at ±16 g / ±2000 dps, 1 kHz.
///
/// # Errors
///
/// Bus failure, or [`ConfigurationFault::WrongDeviceId`].
pub fn init<I: I2c, D: DelayNs>(
    i2c: &mut I,
    delay: &mut D,
    address: u8,
) -> Result<(), InitError<I::Error>> {
    let mut id = [0u8; 1];
    i2c.write_read(address, &[REG_WHO_AM_I], &mut id)
        .map_err(InitError::Bus)?;
    let [id] = id;
    if id != WHO_AM_I {
        return Err(ConfigurationFault::WrongDeviceId {
            expected: u16::from(WHO_AM_I),
            found: u16::from(id),
        }
        .into());
    }

    write_reg(i2c, address, REG_DEVICE_CONFIG, SOFT_RESET)?;
    delay.delay_ms(RESET_DELAY_MS);
    write_reg(i2c, address, REG_PWR_MGMT0, PWR_GYRO_ACCEL_LOW_NOISE)?;
    // Gyro needs 200 µs after leaving OFF before config writes are honoured.
    delay.delay_ms(1);
    write_reg(i2c, address, REG_GYRO_CONFIG0, GYRO_FS_2000DPS_1KHZ)?;
    write_reg(i2c, address, REG_ACCEL_CONFIG0, ACCEL_FS_16G_1KHZ)?;
    Ok(())
}

fn be_i16(raw: &[u8], offset: usize) -> Option<i16> {
    let hi = *raw.get(offset)?;
    let lo = *raw.get(offset.checked_add(1)?)?;
    Some(i16::from_be_bytes([hi, lo]))
}

fn axes(raw: &[u8], offset: usize, scale: f32) -> Option<[f32; 3]> {
    Some([
        f32::from(be_i16(raw, offset)?) * scale,
        f32::from(be_i16(raw, offset.checked_add(2)?)?) * scale,
        f32::from(be_i16(raw, offset.checked_add(4)?)?) * scale,
    ])
}

fn temperature(raw: i16) -> f32 {
    f32::from(raw) / TEMP_SENSITIVITY + TEMP_OFFSET_C
}

/// Decode the 14-byte burst from TEMP_DATA1.
pub fn decode_burst(raw: &[u8]) -> Option<MotionSample> {
    if raw.len() != usize::from(BURST_LEN) {
        return None;
    }
    Some(MotionSample {
        temperature_c: temperature(be_i16(raw, 0)?),
        accel_g: axes(raw, 2, ACCEL_SCALE)?,
        gyro_dps: axes(raw, 8, GYRO_SCALE)?,
    })
}

/// Decode the split layout: accel (6 B), gyro (6 B), temp (2 B).
pub fn decode_split(accel: &[u8], gyro: &[u8], temp: &[u8]) -> Option<MotionSample> {
    if accel.len() != 6 || gyro.len() != 6 || temp.len() != 2 {
        return None;
    }
    Some(MotionSample {
        temperature_c: temperature(be_i16(temp, 0)?),
        accel_g: axes(accel, 0, ACCEL_SCALE)?,
        gyro_dps: axes(gyro, 0, GYRO_SCALE)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn init_writes_datasheet_sequence() {
        let expectations = [
            Transaction::write_read(ADDRESS, vec![0x75], vec![0x47]),
            Transaction::write(ADDRESS, vec![0x11, 0x01]),
            Transaction::write(ADDRESS, vec![0x4E, 0x0F]),
            Transaction::write(ADDRESS, vec![0x4F, 0x06]),
            Transaction::write(ADDRESS, vec![0x50, 0x06]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        init(&mut i2c, &mut NoopDelay::new(), ADDRESS).unwrap();
        i2c.done();
    }

    #[test]
    fn wrong_who_am_i_stops_before_any_write() {
        let expectations = [Transaction::write_read(ADDRESS, vec![0x75], vec![0x12])];
        let mut i2c = I2cMock::new(&expectations);
        assert!(matches!(
            init(&mut i2c, &mut NoopDelay::new(), ADDRESS),
            Err(InitError::Config(ConfigurationFault::WrongDeviceId { .. }))
        ));
        i2c.done();
    }

    #[test]
    fn burst_decodes_big_endian_and_scales() {
        // temp = 0 → 25 °C; accel X = +1 g (2048 LSB); gyro Z = -2000 dps.
        let raw = [
            0x00, 0x00, // temp
            0x08, 0x00, 0x00, 0x00, 0x00, 0x00, // accel
            0x00, 0x00, 0x00, 0x00, 0x80, 0x00, // gyro
        ];
        let s = decode_burst(&raw).unwrap();
        assert!((s.temperature_c - 25.0).abs() < 1e-6);
        assert!((s.accel_g[0] - 1.0).abs() < 1e-6);
        assert_eq!(s.accel_g[1], 0.0);
        assert!((s.gyro_dps[2] + 2000.0).abs() < 1e-3);
    }

    #[test]
    fn split_matches_burst() {
        let burst = [
            0x01, 0x08, 0x00, 0x10, 0xFF, 0xF0, 0x40, 0x00, 0x00, 0x20, 0x00, 0x40, 0xC0, 0x00,
        ];
        let a = decode_burst(&burst).unwrap();
        let b = decode_split(&burst[2..8], &burst[8..14], &burst[0..2]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(decode_burst(&[0u8; 12]).is_none());
    }
}
