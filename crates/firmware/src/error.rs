//! Fault taxonomy shared by the engine, the plan and sensor bring-up.

use core::fmt;

use platform::BusError;

/// Static misconfiguration of a device or plan. Fatal to the affected
/// device's initialization; never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationFault {
    /// Device address is 0x00.
    ZeroAddress,
    /// Device address does not fit in 7 bits.
    AddressOutOfRange(u8),
    /// Multiplexer channel outside 0..=7.
    ChannelOutOfRange(u8),
    /// Device has no read steps.
    EmptyDevice,
    /// A read step asks for zero bytes.
    ZeroLengthStep,
    /// A read step is longer than the landing buffer.
    StepTooLong(u8),
    /// Step lengths do not match what the device's decoder expects.
    ShapeMismatch,
    /// Plan table is full (devices or steps).
    PlanFull,
    /// Device index does not exist in the plan.
    NoSuchDevice(usize),
    /// Identification register returned an unexpected value.
    WrongDeviceId {
        /// Value the datasheet specifies.
        expected: u16,
        /// Value read back.
        found: u16,
    },
}

impl fmt::Display for ConfigurationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAddress => write!(f, "device address is zero"),
            Self::AddressOutOfRange(a) => write!(f, "address 0x{a:02X} exceeds 7 bits"),
            Self::ChannelOutOfRange(c) => write!(f, "mux channel {c} out of range 0..=7"),
            Self::EmptyDevice => write!(f, "device has no read steps"),
            Self::ZeroLengthStep => write!(f, "read step of zero bytes"),
            Self::StepTooLong(n) => write!(f, "read step of {n} bytes exceeds landing buffer"),
            Self::ShapeMismatch => write!(f, "read steps do not match device decoder"),
            Self::PlanFull => write!(f, "device plan is full"),
            Self::NoSuchDevice(i) => write!(f, "no device at plan index {i}"),
            Self::WrongDeviceId { expected, found } => {
                write!(f, "device id 0x{found:04X}, expected 0x{expected:04X}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigurationFault {}

/// Returned by `start_sweep` when a sweep is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Busy;

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sweep already in flight")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Busy {}

/// Failure of a physical recovery procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryError {
    /// SCL/SDA could not be reconfigured or driven.
    Lines,
    /// Peripheral refused to come back after reset.
    Reinit(BusError),
    /// SDA still reads low after the STOP: a slave is still holding the bus.
    StillHeld,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines => f.write_str("bus line reconfiguration failed"),
            Self::Reinit(e) => write!(f, "peripheral reinit failed: {e}"),
            Self::StillHeld => f.write_str("SDA still held low after recovery"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecoveryError {}

/// Severity class of a bus fault, and the mechanism that handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultClass {
    /// NACK or isolated timeout. Lightweight per-transaction reset; the sweep
    /// is aborted and retried next cycle.
    TransientBusFault,
    /// Consecutive-failure threshold crossed. Bus Recovery.
    PersistentBusFault,
    /// Peripheral BUSY while software is idle. Forced Reset.
    StuckBus,
    /// Wrong device ID or bad plan entry. Device left uninitialized.
    ConfigurationFault,
}

impl FaultClass {
    /// Short static name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransientBusFault => "transient",
            Self::PersistentBusFault => "persistent",
            Self::StuckBus => "stuck-bus",
            Self::ConfigurationFault => "configuration",
        }
    }
}
