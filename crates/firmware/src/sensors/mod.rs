//! Sensor drivers: blocking bring-up and sweep-frame decoding.
//!
//! Bring-up runs once at boot over a blocking `embedded-hal` bus, before the
//! acquisition engine takes the peripheral. Decoding runs inside the engine
//! on every completed sweep and must not touch the bus.

pub mod bme280;
pub mod icm42688;
pub mod tca9548a;
pub mod vcnl4040;

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::Vec;
use platform::BusAddress;

use crate::acquisition::frame::Reading;
use crate::acquisition::plan::{DeviceDescriptor, DeviceKind, DevicePlan, MuxRoute, MAX_DEVICES};
use crate::acquisition::router;
use crate::error::ConfigurationFault;

/// Sensor initialization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError<E> {
    /// The bus transaction failed.
    Bus(E),
    /// The device answered but is not what the plan says it is.
    Config(ConfigurationFault),
}

impl<E> From<ConfigurationFault> for InitError<E> {
    fn from(fault: ConfigurationFault) -> Self {
        Self::Config(fault)
    }
}

impl<E: embedded_hal::i2c::Error> fmt::Display for InitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error: {}", e.kind()),
            Self::Config(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: embedded_hal::i2c::Error> std::error::Error for InitError<E> {}

/// Why a device was left out, without the driver's error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceFailure {
    /// No answer or bus error.
    Bus,
    /// Wrong identity.
    Config(ConfigurationFault),
}

impl<E> From<InitError<E>> for DeviceFailure {
    fn from(err: InitError<E>) -> Self {
        match err {
            InitError::Bus(_) => Self::Bus,
            InitError::Config(c) => Self::Config(c),
        }
    }
}

/// Result of [`bring_up`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BringUpReport {
    /// BME280 trim per plan index.
    pub calibrations: Vec<(usize, bme280::Calibration), MAX_DEVICES>,
    /// Devices that failed, per plan index.
    pub failed: Vec<(usize, DeviceFailure), MAX_DEVICES>,
}

impl BringUpReport {
    /// `true` if every device came up.
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }

    /// Attach calibrations and drop failed devices from `plan`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationFault::NoSuchDevice`] if the report is from another plan.
    pub fn apply(&self, plan: &mut DevicePlan) -> Result<(), ConfigurationFault> {
        for (device, cal) in &self.calibrations {
            plan.set_calibration(*device, *cal)?;
        }
        plan.retain(|i, _| !self.failed.iter().any(|(f, _)| *f == i));
        Ok(())
    }
}

type Outcome = Result<Option<bme280::Calibration>, DeviceFailure>;

fn init_device<I: I2c, D: DelayNs>(
    i2c: &mut I,
    delay: &mut D,
    device: &DeviceDescriptor,
) -> Result<Option<bme280::Calibration>, InitError<I::Error>> {
    if let Some(route) = device.route {
        router::select_route_blocking(i2c, route).map_err(InitError::Bus)?;
    }
    let address = device.address.get();
    match device.kind {
        DeviceKind::AmbientLight | DeviceKind::Proximity => {
            vcnl4040::init(i2c, delay, address).map(|()| None)
        }
        DeviceKind::ImuBurst | DeviceKind::ImuSplit => {
            icm42688::init(i2c, delay, address).map(|()| None)
        }
        DeviceKind::Environment => bme280::init(i2c, delay, address).map(Some),
        DeviceKind::Raw => Ok(None),
    }
}

/// Initialize every device in `plan` once.
///
/// Descriptors that share an address and route (ambient light and proximity
/// on one VCNL4040) share one initialization. Failures are reported, never
/// retried.
pub fn bring_up<I: I2c, D: DelayNs>(i2c: &mut I, delay: &mut D, plan: &DevicePlan) -> BringUpReport {
    let mut report = BringUpReport::default();
    let mut seen: Vec<(BusAddress, Option<MuxRoute>, Outcome), MAX_DEVICES> = Vec::new();

    for (index, device) in plan.devices().iter().enumerate() {
        let previous = seen
            .iter()
            .find(|(a, r, _)| *a == device.address && *r == device.route)
            .map(|(_, _, o)| *o);
        let outcome = match previous {
            Some(o) => o,
            None => {
                let o = init_device(i2c, delay, device).map_err(DeviceFailure::from);
                // `seen` has the same capacity as the plan.
                let _ = seen.push((device.address, device.route, o));
                match o {
                    Ok(_) => info!("sensor {} at {} ready", device.kind.as_str(), device.address),
                    Err(DeviceFailure::Config(c)) => {
                        warn!("sensor {} at {}: {}", device.kind.as_str(), device.address, c)
                    }
                    Err(DeviceFailure::Bus) => {
                        warn!("sensor {} at {}: no answer", device.kind.as_str(), device.address)
                    }
                }
                o
            }
        };
        // Both pushes are bounded by the plan length.
        match outcome {
            Ok(Some(cal)) => {
                let _ = report.calibrations.push((index, cal));
            }
            Ok(None) => {}
            Err(f) => {
                let _ = report.failed.push((index, f));
            }
        }
    }
    report
}

/// Decode the raw bytes of one device's steps. `steps` holds one slice per
/// read step, in plan order.
pub fn decode(device: &DeviceDescriptor, steps: &[&[u8]]) -> Option<Reading> {
    match (device.kind, steps) {
        (DeviceKind::AmbientLight, [raw]) => {
            vcnl4040::decode_counts(raw).map(|counts| Reading::AmbientLight { counts })
        }
        (DeviceKind::Proximity, [raw]) => {
            vcnl4040::decode_counts(raw).map(|counts| Reading::Proximity { counts })
        }
        (DeviceKind::ImuBurst, [raw]) => icm42688::decode_burst(raw).map(Reading::Motion),
        (DeviceKind::ImuSplit, [accel, gyro, temp]) => {
            icm42688::decode_split(accel, gyro, temp).map(Reading::Motion)
        }
        (DeviceKind::Environment, [raw]) => bme280::decode(raw, device.calibration.as_ref()),
        (DeviceKind::Raw, [raw, ..]) => Vec::from_slice(raw).ok().map(Reading::Raw),
        _ => None,
    }
}
