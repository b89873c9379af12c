//! Device Plan Table
//!
//! Ordered, swappable description of every device read in one sweep. Each
//! [`DeviceDescriptor`] names the device address, the optional multiplexer
//! route, the `(register, length)` read steps, and the decoder that turns the
//! landed bytes into a [`Reading`](super::frame::Reading).
//!
//! The scheduler walks a flattened view of the table: step `i` of the sweep
//! is the `i`-th `(device, step)` pair in plan order. Step `i`'s raw
//! destination buffer is the engine's raw buffer `i`.
//!
//! Layout variants (with or without the multiplexed cluster, split vs burst
//! IMU reads) are different `DevicePlan` values, not different code.

use heapless::Vec;
use platform::dma_safety::MAX_READ_LEN;
use platform::{AddressError, BusAddress};

use crate::error::ConfigurationFault;
use crate::sensors::bme280::Calibration;
use crate::sensors::{bme280, icm42688, tca9548a, vcnl4040};

/// Devices per plan.
pub const MAX_DEVICES: usize = 16;

/// Read steps per device.
pub const MAX_STEPS_PER_DEVICE: usize = 4;

/// Read steps per sweep, across all devices.
pub const MAX_PLAN_STEPS: usize = 32;

// ── Mux channel newtype ──────────────────────────────────────────────────────

/// Multiplexer channel, invariant `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct MuxChannel(u8);

impl MuxChannel {
    /// Number of channels on a TCA9548A.
    pub const COUNT: u8 = 8;

    /// # Errors
    ///
    /// [`ConfigurationFault::ChannelOutOfRange`] if `channel > 7`.
    pub const fn new(channel: u8) -> Result<Self, ConfigurationFault> {
        if channel < Self::COUNT {
            Ok(Self(channel))
        } else {
            Err(ConfigurationFault::ChannelOutOfRange(channel))
        }
    }

    /// Channel number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Control-register byte selecting only this channel.
    #[allow(clippy::arithmetic_side_effects)] // self.0 < 8
    pub const fn mask(self) -> u8 {
        1 << self.0
    }
}

/// Multiplexer address + channel a device sits behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxRoute {
    /// Multiplexer address.
    pub mux: BusAddress,
    /// Downstream channel.
    pub channel: MuxChannel,
}

/// One register burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadStep {
    /// First register.
    pub register: u8,
    /// Bytes to read.
    pub len: u8,
}

/// Decoder selection for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceKind {
    /// VCNL4040 ambient light: one 2-byte LE step.
    AmbientLight,
    /// VCNL4040 proximity: one 2-byte LE step.
    Proximity,
    /// ICM-42688 temp+accel+gyro burst: one 14-byte BE step.
    ImuBurst,
    /// ICM-42688 accel (6), gyro (6), temp (2): three BE steps.
    ImuSplit,
    /// BME280 press+temp+hum burst: one 8-byte step.
    Environment,
    /// Bytes of the first step published as-is.
    Raw,
}

impl DeviceKind {
    /// Step lengths the decoder expects, `None` for any shape.
    pub const fn expected_lengths(self) -> Option<&'static [u8]> {
        match self {
            Self::AmbientLight | Self::Proximity => Some(&[2]),
            Self::ImuBurst => Some(&[icm42688::BURST_LEN]),
            Self::ImuSplit => Some(&[6, 6, 2]),
            Self::Environment => Some(&[bme280::BURST_LEN]),
            Self::Raw => None,
        }
    }

    /// Short static name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmbientLight => "vcnl-als",
            Self::Proximity => "vcnl-ps",
            Self::ImuBurst => "imu-burst",
            Self::ImuSplit => "imu-split",
            Self::Environment => "bme280",
            Self::Raw => "raw",
        }
    }
}

// ── Device descriptor ────────────────────────────────────────────────────────

/// Immutable description of one device in the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    /// Device address.
    pub address: BusAddress,
    /// Multiplexer route, if the device is behind one.
    pub route: Option<MuxRoute>,
    /// Read steps, in bus order.
    pub steps: Vec<ReadStep, MAX_STEPS_PER_DEVICE>,
    /// Decoder.
    pub kind: DeviceKind,
    /// BME280 trimming parameters, filled in by bring-up.
    pub calibration: Option<Calibration>,
}

impl DeviceDescriptor {
    /// Directly addressed device with no steps yet.
    ///
    /// `address` accepts the 7-bit form; use
    /// [`BusAddress::from_eight_bit`] first for datasheet 8-bit values.
    ///
    /// # Errors
    ///
    /// [`ConfigurationFault::ZeroAddress`] / [`ConfigurationFault::AddressOutOfRange`].
    pub fn new(address: u8, kind: DeviceKind) -> Result<Self, ConfigurationFault> {
        Ok(Self {
            address: checked_address(address)?,
            route: None,
            steps: Vec::new(),
            kind,
            calibration: None,
        })
    }

    /// Append a read step.
    ///
    /// # Errors
    ///
    /// Zero-length, over-long, or too many steps.
    pub fn with_step(mut self, register: u8, len: u8) -> Result<Self, ConfigurationFault> {
        if len == 0 {
            return Err(ConfigurationFault::ZeroLengthStep);
        }
        if usize::from(len) > MAX_READ_LEN {
            return Err(ConfigurationFault::StepTooLong(len));
        }
        self.steps
            .push(ReadStep { register, len })
            .map_err(|_| ConfigurationFault::PlanFull)?;
        Ok(self)
    }

    /// Place the device behind multiplexer `mux` on `channel`.
    ///
    /// # Errors
    ///
    /// Channel above 7 or invalid mux address.
    pub fn behind_mux(mut self, mux: u8, channel: u8) -> Result<Self, ConfigurationFault> {
        self.route = Some(MuxRoute {
            mux: checked_address(mux)?,
            channel: MuxChannel::new(channel)?,
        });
        Ok(self)
    }

    /// Check the descriptor invariants.
    ///
    /// # Errors
    ///
    /// The first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigurationFault> {
        if self.steps.is_empty() {
            return Err(ConfigurationFault::EmptyDevice);
        }
        for step in &self.steps {
            if step.len == 0 {
                return Err(ConfigurationFault::ZeroLengthStep);
            }
            if usize::from(step.len) > MAX_READ_LEN {
                return Err(ConfigurationFault::StepTooLong(step.len));
            }
        }
        if let Some(expected) = self.kind.expected_lengths() {
            let lens = self.steps.iter().map(|s| s.len);
            if !lens.eq(expected.iter().copied()) {
                return Err(ConfigurationFault::ShapeMismatch);
            }
        }
        Ok(())
    }
}

fn checked_address(raw: u8) -> Result<BusAddress, ConfigurationFault> {
    BusAddress::new(raw).map_err(|e| match e {
        AddressError::Zero => ConfigurationFault::ZeroAddress,
        AddressError::OutOfRange(a) => ConfigurationFault::AddressOutOfRange(a),
    })
}

/// One flattened sweep step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlanStep {
    /// Index of the owning device.
    pub device: usize,
    /// Device address.
    pub address: BusAddress,
    /// Route to select before this step.
    pub route: Option<MuxRoute>,
    /// Register and length.
    pub read: ReadStep,
}

// ── Plan ─────────────────────────────────────────────────────────────────────

/// Ordered set of devices read in one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePlan {
    devices: Vec<DeviceDescriptor, MAX_DEVICES>,
    // Indexed by device: that device's first flattened step index.
    first_step: Vec<usize, MAX_DEVICES>,
    step_count: usize,
}

impl DevicePlan {
    /// Empty plan.
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
            first_step: Vec::new(),
            step_count: 0,
        }
    }

    /// Append a device after validating it.
    ///
    /// # Errors
    ///
    /// Invalid descriptor, or device/step capacity exhausted.
    pub fn push(&mut self, device: DeviceDescriptor) -> Result<(), ConfigurationFault> {
        device.validate()?;
        let steps = device.steps.len();
        let total = self
            .step_count
            .checked_add(steps)
            .filter(|t| *t <= MAX_PLAN_STEPS)
            .ok_or(ConfigurationFault::PlanFull)?;
        if self.devices.is_full() {
            return Err(ConfigurationFault::PlanFull);
        }
        self.first_step
            .push(self.step_count)
            .map_err(|_| ConfigurationFault::PlanFull)?;
        self.devices
            .push(device)
            .map_err(|_| ConfigurationFault::PlanFull)?;
        self.step_count = total;
        Ok(())
    }

    /// Builder form of [`push`](Self::push).
    ///
    /// # Errors
    ///
    /// As [`push`](Self::push).
    pub fn with(mut self, device: DeviceDescriptor) -> Result<Self, ConfigurationFault> {
        self.push(device)?;
        Ok(self)
    }

    /// Devices in sweep order.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// `true` when no device is configured.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of flattened read steps (scheduler states between Idle and Done).
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Flattened step `index`.
    pub fn step(&self, index: usize) -> Option<PlanStep> {
        let device = self.first_step.iter().rposition(|first| *first <= index)?;
        let desc = self.devices.get(device)?;
        let first = *self.first_step.get(device)?;
        let read = *desc.steps.get(index.checked_sub(first)?)?;
        Some(PlanStep {
            device,
            address: desc.address,
            route: desc.route,
            read,
        })
    }

    /// Flattened step indices belonging to `device`.
    pub fn step_range(&self, device: usize) -> Option<core::ops::Range<usize>> {
        let first = *self.first_step.get(device)?;
        let len = self.devices.get(device)?.steps.len();
        Some(first..first.checked_add(len)?)
    }

    /// Attach BME280 trimming parameters to `device`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationFault::NoSuchDevice`].
    pub fn set_calibration(
        &mut self,
        device: usize,
        calibration: Calibration,
    ) -> Result<(), ConfigurationFault> {
        let desc = self
            .devices
            .get_mut(device)
            .ok_or(ConfigurationFault::NoSuchDevice(device))?;
        desc.calibration = Some(calibration);
        Ok(())
    }

    /// Keep only the devices for which `keep(index, descriptor)` is true.
    pub fn retain(&mut self, mut keep: impl FnMut(usize, &DeviceDescriptor) -> bool) {
        let old = core::mem::take(&mut self.devices);
        self.first_step.clear();
        self.step_count = 0;
        for (i, device) in old.into_iter().enumerate() {
            if keep(i, &device) {
                // Capacity and validity were checked when the device was first pushed.
                let _ = self.push(device);
            }
        }
    }

    /// Validate every descriptor.
    ///
    /// # Errors
    ///
    /// First failing descriptor's fault.
    pub fn validate(&self) -> Result<(), ConfigurationFault> {
        self.devices.iter().try_for_each(DeviceDescriptor::validate)
    }

    /// Production sweep: VCNL4040 ambient light and proximity, ICM-42688
    /// burst, then eight BME280s behind the TCA9548A on channels 0..=7.
    ///
    /// # Errors
    ///
    /// Never in practice; the constants are valid.
    pub fn sensor_hub_default() -> Result<Self, ConfigurationFault> {
        let mut plan = Self::new()
            .with(
                DeviceDescriptor::new(vcnl4040::ADDRESS, DeviceKind::AmbientLight)?
                    .with_step(vcnl4040::REG_ALS_DATA, 2)?,
            )?
            .with(
                DeviceDescriptor::new(vcnl4040::ADDRESS, DeviceKind::Proximity)?
                    .with_step(vcnl4040::REG_PS_DATA, 2)?,
            )?
            .with(
                DeviceDescriptor::new(icm42688::ADDRESS, DeviceKind::ImuBurst)?
                    .with_step(icm42688::REG_TEMP_DATA1, icm42688::BURST_LEN)?,
            )?;
        for channel in 0..MuxChannel::COUNT {
            plan.push(
                DeviceDescriptor::new(bme280::ADDRESS, DeviceKind::Environment)?
                    .with_step(bme280::REG_PRESS_MSB, bme280::BURST_LEN)?
                    .behind_mux(tca9548a::ADDRESS, channel)?,
            )?;
        }
        Ok(plan)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    // ── Test A ────────────────────────────────────────────────────────────────
    /// Default plan has the 11 devices of the production board, in bus order.
    #[test]
    fn test_default_plan_layout() {
        let plan = DevicePlan::sensor_hub_default().unwrap();
        assert_eq!(plan.len(), 11);
        assert_eq!(plan.step_count(), 11);

        let first = plan.step(0).unwrap();
        assert_eq!(first.address.get(), 0x60);
        assert_eq!(first.read, ReadStep { register: 0x09, len: 2 });
        assert!(first.route.is_none());

        let imu = plan.step(2).unwrap();
        assert_eq!(imu.address.get(), 0x68);
        assert_eq!(imu.read, ReadStep { register: 0x1D, len: 14 });

        for ch in 0..8u8 {
            let s = plan.step(3 + usize::from(ch)).unwrap();
            assert_eq!(s.address.get(), 0x76);
            assert_eq!(s.read, ReadStep { register: 0xF7, len: 8 });
            let route = s.route.unwrap();
            assert_eq!(route.mux.get(), 0x70);
            assert_eq!(route.channel.get(), ch);
        }
        assert!(plan.step(11).is_none());
    }

    // ── Test B ────────────────────────────────────────────────────────────────
    /// Channel 8 is rejected at construction.
    #[test]
    fn test_channel_out_of_range_rejected() {
        let d = DeviceDescriptor::new(0x76, DeviceKind::Environment)
            .unwrap()
            .with_step(0xF7, 8)
            .unwrap();
        assert_eq!(
            d.behind_mux(0x70, 8),
            Err(ConfigurationFault::ChannelOutOfRange(8))
        );
    }

    // ── Test C ────────────────────────────────────────────────────────────────
    /// Zero address, zero-length and over-long steps are configuration faults.
    #[test]
    fn test_descriptor_invariants() {
        assert_eq!(
            DeviceDescriptor::new(0, DeviceKind::Raw),
            Err(ConfigurationFault::ZeroAddress)
        );
        let d = DeviceDescriptor::new(0x10, DeviceKind::Raw).unwrap();
        assert_eq!(
            d.clone().with_step(0x00, 0),
            Err(ConfigurationFault::ZeroLengthStep)
        );
        assert_eq!(
            d.clone().with_step(0x00, 33),
            Err(ConfigurationFault::StepTooLong(33))
        );
        assert_eq!(d.validate(), Err(ConfigurationFault::EmptyDevice));
    }

    // ── Test D ────────────────────────────────────────────────────────────────
    /// Split IMU reads flatten to three consecutive steps of one device.
    #[test]
    fn test_multi_step_device_flattening() {
        let plan = DevicePlan::new()
            .with(
                DeviceDescriptor::new(0x60, DeviceKind::AmbientLight)
                    .unwrap()
                    .with_step(0x09, 2)
                    .unwrap(),
            )
            .unwrap()
            .with(
                DeviceDescriptor::new(0x68, DeviceKind::ImuSplit)
                    .unwrap()
                    .with_step(0x1F, 6)
                    .unwrap()
                    .with_step(0x25, 6)
                    .unwrap()
                    .with_step(0x1D, 2)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(plan.step_count(), 4);
        assert_eq!(plan.step_range(0), Some(0..1));
        assert_eq!(plan.step_range(1), Some(1..4));
        assert_eq!(plan.step_range(2), None);
        assert_eq!(plan.step(3).unwrap().device, 1);
        assert_eq!(plan.step(3).unwrap().read.register, 0x1D);
    }

    // ── Test E ────────────────────────────────────────────────────────────────
    /// Decoder shape is enforced: a 4-byte ambient-light read is rejected.
    #[test]
    fn test_shape_mismatch_rejected() {
        let d = DeviceDescriptor::new(0x60, DeviceKind::AmbientLight)
            .unwrap()
            .with_step(0x09, 4)
            .unwrap();
        assert_eq!(
            DevicePlan::new().with(d),
            Err(ConfigurationFault::ShapeMismatch)
        );
    }

    // ── Test F ────────────────────────────────────────────────────────────────
    /// retain() drops devices and re-flattens the step table.
    #[test]
    fn test_retain_reflattens() {
        let mut plan = DevicePlan::sensor_hub_default().unwrap();
        // Drop the BME280 on mux channel 3 (plan index 6).
        plan.retain(|i, _| i != 6);
        assert_eq!(plan.len(), 10);
        assert_eq!(plan.step_count(), 10);
        let s = plan.step(6).unwrap();
        assert_eq!(s.route.unwrap().channel.get(), 4);
    }

    // ── Test G ────────────────────────────────────────────────────────────────
    /// Channel mask is a single bit.
    #[test]
    fn test_mux_channel_mask() {
        for c in 0..8u8 {
            assert_eq!(MuxChannel::new(c).unwrap().mask(), 1 << c);
        }
        assert!(MuxChannel::new(8).is_err());
    }
}
