//! Decoded result frame.

use heapless::Vec;
use platform::dma_safety::MAX_READ_LEN;

use super::plan::MAX_DEVICES;

/// Accelerometer / gyroscope / die temperature in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSample {
    /// Acceleration in g, X/Y/Z.
    pub accel_g: [f32; 3],
    /// Angular rate in degrees per second, X/Y/Z.
    pub gyro_dps: [f32; 3],
    /// Die temperature in °C.
    pub temperature_c: f32,
}

/// Compensated BME280 reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentSample {
    /// Temperature in hundredths of a degree Celsius.
    pub temperature_centi_c: i32,
    /// Pressure in pascal.
    pub pressure_pa: u32,
    /// Relative humidity in 1/1024 %RH.
    pub humidity_q10: u32,
}

/// BME280 ADC counts, published when no calibration is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawEnvironment {
    /// 20-bit pressure ADC.
    pub pressure: u32,
    /// 20-bit temperature ADC.
    pub temperature: u32,
    /// 16-bit humidity ADC.
    pub humidity: u16,
}

/// One device's contribution to a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// VCNL4040 ALS counts.
    AmbientLight {
        /// Raw counts.
        counts: u16,
    },
    /// VCNL4040 PS counts.
    Proximity {
        /// Raw counts.
        counts: u16,
    },
    /// ICM-42688 sample.
    Motion(MotionSample),
    /// Compensated BME280 sample.
    Environment(EnvironmentSample),
    /// Uncompensated BME280 sample.
    RawEnvironment(RawEnvironment),
    /// Undecoded bytes.
    Raw(Vec<u8, MAX_READ_LEN>),
}

/// Reading tagged with the plan index of its device.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Plan index.
    pub device: usize,
    /// Sweep the raw bytes were captured in.
    pub sweep: u32,
    /// Decoded value.
    pub reading: Reading,
}

/// Every device's reading from one completed sweep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultFrame {
    /// Sweep sequence number, starting at 1.
    pub sweep: u32,
    /// One entry per device that decoded.
    pub fields: Vec<Field, MAX_DEVICES>,
}

impl ResultFrame {
    /// Reading for plan index `device`.
    pub fn reading(&self, device: usize) -> Option<&Reading> {
        self.fields
            .iter()
            .find(|f| f.device == device)
            .map(|f| &f.reading)
    }

    /// `true` when every field was decoded in this frame's sweep.
    pub fn is_consistent(&self) -> bool {
        self.fields.iter().all(|f| f.sweep == self.sweep)
    }

    /// Empty the frame for reuse.
    pub fn clear(&mut self) {
        self.sweep = 0;
        self.fields.clear();
    }
}
