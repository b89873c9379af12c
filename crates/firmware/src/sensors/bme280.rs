//! BME280 humidity / pressure / temperature sensor.
//!
//! Reference: Bosch Sensortec BST-BME280-DS002. Eight identical sensors sit
//! at 0x76, one per TCA9548A channel, so every access is preceded by a
//! channel select.
//!
//! Data burst from 0xF7 (8 bytes):
//!
//! ```text
//! b0 press_msb  b1 press_lsb  b2 press_xlsb[7:4]
//! b3 temp_msb   b4 temp_lsb   b5 temp_xlsb[7:4]
//! b6 hum_msb    b7 hum_lsb
//! ```
//!
//! Compensation is the datasheet's integer reference code (§4.2.3 and
//! appendix 8.2, 64-bit pressure variant).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::InitError;
use crate::acquisition::frame::{EnvironmentSample, RawEnvironment, Reading};
use crate::error::ConfigurationFault;

/// 7-bit I2C address with SDO low.
pub const ADDRESS: u8 = 0x76;
/// Start of calib00..calib25 (T1..P9, H1).
pub const REG_CALIB00: u8 = 0x88;
/// chip_id.
pub const REG_ID: u8 = 0xD0;
/// reset.
pub const REG_RESET: u8 = 0xE0;
/// Start of calib26..calib32 (H2..H6).
pub const REG_CALIB26: u8 = 0xE1;
/// ctrl_hum.
pub const REG_CTRL_HUM: u8 = 0xF2;
/// ctrl_meas.
pub const REG_CTRL_MEAS: u8 = 0xF4;
/// config.
pub const REG_CONFIG: u8 = 0xF5;
/// press_msb: start of the data burst.
pub const REG_PRESS_MSB: u8 = 0xF7;

/// Expected chip_id.
pub const CHIP_ID: u8 = 0x60;
/// Writing this to `reset` triggers a power-on reset.
pub const SOFT_RESET: u8 = 0xB6;
/// Oversampling ×1.
pub const OVERSAMPLE_1X: u8 = 0x01;
/// Continuous conversion.
pub const MODE_NORMAL: u8 = 0x03;
/// osrs_t ×1, osrs_p ×1, normal mode.
pub const CTRL_MEAS_NORMAL: u8 = (OVERSAMPLE_1X << 5) | (OVERSAMPLE_1X << 2) | MODE_NORMAL;
/// t_sb 0.5 ms, filter off.
pub const CONFIG_DEFAULT: u8 = 0x00;
/// Start-up time after soft reset (datasheet: 2 ms).
pub const RESET_DELAY_MS: u32 = 10;

/// Data burst length.
pub const BURST_LEN: u8 = 8;
/// Length of the first calibration block.
pub const CALIB_BLOCK_A_LEN: usize = 26;
/// Length of the second calibration block.
pub const CALIB_BLOCK_B_LEN: usize = 7;

/// Factory trimming parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Parse the two calibration blocks read from 0x88 and 0xE1.
    pub fn parse(a: &[u8; CALIB_BLOCK_A_LEN], b: &[u8; CALIB_BLOCK_B_LEN]) -> Self {
        let [t1l, t1h, t2l, t2h, t3l, t3h, p1l, p1h, p2l, p2h, p3l, p3h, p4l, p4h, p5l, p5h, p6l, p6h, p7l, p7h, p8l, p8h, p9l, p9h, _, h1] =
            *a;
        let [h2l, h2h, h3, e4, e5, e6, h6] = *b;
        Self {
            t1: u16::from_le_bytes([t1l, t1h]),
            t2: i16::from_le_bytes([t2l, t2h]),
            t3: i16::from_le_bytes([t3l, t3h]),
            p1: u16::from_le_bytes([p1l, p1h]),
            p2: i16::from_le_bytes([p2l, p2h]),
            p3: i16::from_le_bytes([p3l, p3h]),
            p4: i16::from_le_bytes([p4l, p4h]),
            p5: i16::from_le_bytes([p5l, p5h]),
            p6: i16::from_le_bytes([p6l, p6h]),
            p7: i16::from_le_bytes([p7l, p7h]),
            p8: i16::from_le_bytes([p8l, p8h]),
            p9: i16::from_le_bytes([p9l, p9h]),
            h1,
            h2: i16::from_le_bytes([h2l, h2h]),
            h3,
            // H4 = 0xE4[7:0] << 4 | 0xE5[3:0], H5 = 0xE6[7:0] << 4 | 0xE5[7:4],
            // both signed 12-bit.
            h4: (i16::from(i8::from_ne_bytes([e4])) << 4) | i16::from(e5 & 0x0F),
            h5: (i16::from(i8::from_ne_bytes([e6])) << 4) | i16::from(e5 >> 4),
            h6: i8::from_ne_bytes([h6]),
        }
    }
}

/// Unpack the 8-byte data burst.
pub fn parse_raw(raw: &[u8]) -> Option<RawEnvironment> {
    let [p0, p1, p2, t0, t1, t2, h0, h1] = *raw else {
        return None;
    };
    let twenty = |msb: u8, lsb: u8, xlsb: u8| {
        (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
    };
    Some(RawEnvironment {
        pressure: twenty(p0, p1, p2),
        temperature: twenty(t0, t1, t2),
        humidity: u16::from_be_bytes([h0, h1]),
    })
}

/// Temperature in 0.01 °C and the `t_fine` carry used by the other two.
#[allow(clippy::arithmetic_side_effects)] // 20-bit ADC × 16-bit trim fits in i64
pub fn compensate_temperature(cal: &Calibration, adc_t: u32) -> (i32, i64) {
    let adc = i64::from(adc_t);
    let t1 = i64::from(cal.t1);
    let var1 = (((adc >> 3) - (t1 << 1)) * i64::from(cal.t2)) >> 11;
    let d = (adc >> 4) - t1;
    let var2 = (((d * d) >> 12) * i64::from(cal.t3)) >> 14;
    let t_fine = var1 + var2;
    let centi = (t_fine * 5 + 128) >> 8;
    (i32::try_from(centi).unwrap_or(i32::MAX), t_fine)
}

/// Pressure in Q24.8 Pa, `None` if the trim would divide by zero.
#[allow(clippy::arithmetic_side_effects)] // datasheet 64-bit reference; divisor checked
pub fn compensate_pressure(cal: &Calibration, adc_p: u32, t_fine: i64) -> Option<u32> {
    let mut var1 = t_fine - 128_000;
    let mut var2 = var1 * var1 * i64::from(cal.p6);
    var2 += (var1 * i64::from(cal.p5)) << 17;
    var2 += i64::from(cal.p4) << 35;
    var1 = ((var1 * var1 * i64::from(cal.p3)) >> 8) + ((var1 * i64::from(cal.p2)) << 12);
    var1 = (((1i64 << 47) + var1) * i64::from(cal.p1)) >> 33;
    if var1 == 0 {
        return None;
    }
    let mut p = 1_048_576 - i64::from(adc_p);
    p = (((p << 31) - var2) * 3125) / var1;
    let var1 = (i64::from(cal.p9) * (p >> 13) * (p >> 13)) >> 25;
    let var2 = (i64::from(cal.p8) * p) >> 19;
    p = ((p + var1 + var2) >> 8) + (i64::from(cal.p7) << 4);
    u32::try_from(p).ok()
}

/// Relative humidity in Q22.10 %RH, clamped to 0..=100 %.
#[allow(clippy::arithmetic_side_effects)] // datasheet reference, widened to i64
pub fn compensate_humidity(cal: &Calibration, adc_h: u16, t_fine: i64) -> u32 {
    let v = t_fine - 76_800;
    let scaled = ((i64::from(adc_h) << 14) - (i64::from(cal.h4) << 20) - i64::from(cal.h5) * v
        + 16_384)
        >> 15;
    let h3_term = ((v * i64::from(cal.h3)) >> 11) + 32_768;
    let h6_term = (((v * i64::from(cal.h6)) >> 10) * h3_term) >> 10;
    let gain = ((h6_term + 2_097_152) * i64::from(cal.h2) + 8_192) >> 14;
    let mut x = scaled * gain;
    x -= ((((x >> 15) * (x >> 15)) >> 7) * i64::from(cal.h1)) >> 4;
    let x = x.clamp(0, 419_430_400);
    u32::try_from(x >> 12).unwrap_or(0)
}

/// Full compensation of a data burst.
pub fn compensate(cal: &Calibration, raw: RawEnvironment) -> Option<EnvironmentSample> {
    let (temperature_centi_c, t_fine) = compensate_temperature(cal, raw.temperature);
    let pressure_q8 = compensate_pressure(cal, raw.pressure, t_fine)?;
    Some(EnvironmentSample {
        temperature_centi_c,
        pressure_pa: pressure_q8 >> 8,
        humidity_q10: compensate_humidity(cal, raw.humidity, t_fine),
    })
}

/// Decode a data burst: compensated with calibration, raw counts without.
pub fn decode(raw: &[u8], cal: Option<&Calibration>) -> Option<Reading> {
    let adc = parse_raw(raw)?;
    match cal {
        Some(cal) => compensate(cal, adc).map(Reading::Environment),
        None => Some(Reading::RawEnvironment(adc)),
    }
}

fn write_reg<I: I2c>(
    i2c: &mut I,
    address: u8,
    reg: u8,
    value: u8,
) -> Result<(), InitError<I::Error>> {
    i2c.write(address, &[reg, value]).map_err(InitError::Bus)
}

fn read_regs<I: I2c>(
    i2c: &mut I,
    address: u8,
    reg: u8,
    buf: &mut [u8],
) -> Result<(), InitError<I::Error>> {
    i2c.write_read(address, &[reg], buf).map_err(InitError::Bus)
}

/// Verify chip_id, soft-reset, read the trim and start continuous
/// conversion. The caller selects the sensor's mux channel first.
///
/// # Errors
///
/// Bus failure, or [`ConfigurationFault::WrongDeviceId`].
pub fn init<I: I2c, D: DelayNs>(
    i2c: &mut I,
    delay: &mut D,
    address: u8,
) -> Result<Calibration, InitError<I::Error>> {
    let mut id = [0u8; 1];
    read_regs(i2c, address, REG_ID, &mut id)?;
    let [id] = id;
    if id != CHIP_ID {
        return Err(ConfigurationFault::WrongDeviceId {
            expected: u16::from(CHIP_ID),
            found: u16::from(id),
        }
        .into());
    }

    write_reg(i2c, address, REG_RESET, SOFT_RESET)?;
    delay.delay_ms(RESET_DELAY_MS);

    let mut a = [0u8; CALIB_BLOCK_A_LEN];
    let mut b = [0u8; CALIB_BLOCK_B_LEN];
    read_regs(i2c, address, REG_CALIB00, &mut a)?;
    read_regs(i2c, address, REG_CALIB26, &mut b)?;

    // ctrl_hum only takes effect after a ctrl_meas write; config is ignored
    // in normal mode, so it goes before ctrl_meas.
    write_reg(i2c, address, REG_CTRL_HUM, OVERSAMPLE_1X)?;
    write_reg(i2c, address, REG_CONFIG, CONFIG_DEFAULT)?;
    write_reg(i2c, address, REG_CTRL_MEAS, CTRL_MEAS_NORMAL)?;

    Ok(Calibration::parse(&a, &b))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic, clippy::arithmetic_side_effects)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    /// BMP280 datasheet worked example trim, plus typical humidity trim.
    pub(crate) fn datasheet_calibration() -> Calibration {
        Calibration {
            t1: 27504,
            t2: 26435,
            t3: -1000,
            p1: 36477,
            p2: -10685,
            p3: 3024,
            p4: 2855,
            p5: 140,
            p6: -7,
            p7: 15500,
            p8: -14600,
            p9: 6000,
            h1: 75,
            h2: 362,
            h3: 0,
            h4: 313,
            h5: 50,
            h6: 30,
        }
    }

    fn block_a(c: &Calibration) -> [u8; CALIB_BLOCK_A_LEN] {
        let mut a = [0u8; CALIB_BLOCK_A_LEN];
        let words = [
            c.t1.to_le_bytes(),
            c.t2.to_le_bytes(),
            c.t3.to_le_bytes(),
            c.p1.to_le_bytes(),
            c.p2.to_le_bytes(),
            c.p3.to_le_bytes(),
            c.p4.to_le_bytes(),
            c.p5.to_le_bytes(),
            c.p6.to_le_bytes(),
            c.p7.to_le_bytes(),
            c.p8.to_le_bytes(),
            c.p9.to_le_bytes(),
        ];
        for (i, w) in words.iter().enumerate() {
            a[i * 2..i * 2 + 2].copy_from_slice(w);
        }
        a[25] = c.h1;
        a
    }

    fn block_b(c: &Calibration) -> [u8; CALIB_BLOCK_B_LEN] {
        let h2 = c.h2.to_le_bytes();
        // H4 = 313 = 0x139 → E4 = 0x13, E5[3:0] = 0x9; H5 = 50 = 0x032 → E6 = 0x03, E5[7:4] = 0x2.
        [h2[0], h2[1], c.h3, 0x13, 0x29, 0x03, c.h6.to_ne_bytes()[0]]
    }

    // ── Test A ────────────────────────────────────────────────────────────────
    /// Trim blocks parse back to the values they were built from.
    #[test]
    fn test_calibration_parse() {
        let c = datasheet_calibration();
        assert_eq!(Calibration::parse(&block_a(&c), &block_b(&c)), c);
    }

    // ── Test B ────────────────────────────────────────────────────────────────
    /// Negative H4/H5 keep their sign (12-bit two's complement).
    #[test]
    fn test_humidity_trim_sign_extension() {
        let c = datasheet_calibration();
        let mut b = block_b(&c);
        b[3] = 0xFF; // H4 = 0xFF9 → -7
        b[4] = 0x09;
        let parsed = Calibration::parse(&block_a(&c), &b);
        assert_eq!(parsed.h4, -7);
    }

    // ── Test C ────────────────────────────────────────────────────────────────
    /// Datasheet worked example: 25.08 °C, 100653 Pa.
    #[test]
    fn test_datasheet_temperature_and_pressure() {
        let c = datasheet_calibration();
        let (t, t_fine) = compensate_temperature(&c, 519_888);
        assert_eq!(t, 2508);
        assert_eq!(t_fine, 128_422);
        assert_eq!(compensate_pressure(&c, 415_148, t_fine), Some(25_767_233));
        assert_eq!(compensate_humidity(&c, 30_000, t_fine), 56_317);
    }

    // ── Test D ────────────────────────────────────────────────────────────────
    /// 20-bit fields are packed msb/lsb/xlsb[7:4]; humidity is big-endian.
    #[test]
    fn test_parse_raw_burst() {
        let raw = parse_raw(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30]).unwrap();
        assert_eq!(raw.pressure, 415_148);
        assert_eq!(raw.temperature, 519_888);
        assert_eq!(raw.humidity, 30_000);
        assert!(parse_raw(&[0u8; 7]).is_none());
    }

    // ── Test E ────────────────────────────────────────────────────────────────
    /// Without trim the raw triple is published.
    #[test]
    fn test_decode_without_calibration() {
        let bytes = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];
        assert!(matches!(decode(&bytes, None), Some(Reading::RawEnvironment(_))));
        let Some(Reading::Environment(s)) = decode(&bytes, Some(&datasheet_calibration())) else {
            panic!("expected compensated reading");
        };
        assert_eq!(s.temperature_centi_c, 2508);
        assert_eq!(s.pressure_pa, 100_653);
        assert_eq!(s.humidity_q10, 56_317);
    }

    // ── Test F ────────────────────────────────────────────────────────────────
    /// Bring-up: ID, reset, trim, configure.
    #[test]
    fn test_init_sequence() {
        let c = datasheet_calibration();
        let expectations = [
            Transaction::write_read(ADDRESS, vec![REG_ID], vec![CHIP_ID]),
            Transaction::write(ADDRESS, vec![REG_RESET, SOFT_RESET]),
            Transaction::write_read(ADDRESS, vec![REG_CALIB00], block_a(&c).to_vec()),
            Transaction::write_read(ADDRESS, vec![REG_CALIB26], block_b(&c).to_vec()),
            Transaction::write(ADDRESS, vec![REG_CTRL_HUM, 0x01]),
            Transaction::write(ADDRESS, vec![REG_CONFIG, 0x00]),
            Transaction::write(ADDRESS, vec![REG_CTRL_MEAS, 0x27]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let cal = init(&mut i2c, &mut NoopDelay::new(), ADDRESS).unwrap();
        assert_eq!(cal, c);
        i2c.done();
    }
}
