//! I2C bus abstraction layer
//!
//! Provides the small set of bus primitives the acquisition engine is built on:
//!
//! - [`I2cMaster`] - non-blocking "arm a register read" plus the blocking
//!   single-transfer primitives used for multiplexer selection and probing.
//! - [`PeripheralControl`] - enable/disable/force-reset of the master
//!   peripheral, including the busy-flag erratum workaround.
//! - [`BusAddress`], [`ErrorCode`], [`BusError`] - strongly typed addressing
//!   and the STM32 HAL error bitmask.
//!
//! Completion of an armed read is reported out of band (a DMA/transfer-complete
//! interrupt in hardware, a synthetic event in tests); this module only models
//! the arming side.

use core::fmt;

// ── Address newtype ──────────────────────────────────────────────────────────

/// 7-bit I2C device address.
///
/// Invariant: non-zero and `<= 0x7F`. Datasheets quote either the 7-bit form
/// (`0x60`) or the left-shifted 8-bit form (`0xC0`); construct with
/// [`BusAddress::new`] or [`BusAddress::from_eight_bit`] respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct BusAddress(u8);

/// Error returned when an address is zero or wider than 7 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressError {
    /// Address 0x00 is the general-call address, never a device.
    Zero,
    /// Value does not fit in 7 bits.
    OutOfRange(u8),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "I2C address must be non-zero"),
            Self::OutOfRange(v) => write!(f, "I2C address 0x{v:02X} exceeds 7 bits"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AddressError {}

impl BusAddress {
    /// Create from the 7-bit form.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if `addr` is zero or above `0x7F`.
    pub const fn new(addr: u8) -> Result<Self, AddressError> {
        if addr == 0 {
            Err(AddressError::Zero)
        } else if addr > 0x7F {
            Err(AddressError::OutOfRange(addr))
        } else {
            Ok(Self(addr))
        }
    }

    /// Create from the 8-bit (left-shifted, R/W bit clear) form.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Zero`] if the shifted address is zero.
    pub const fn from_eight_bit(addr: u8) -> Result<Self, AddressError> {
        Self::new(addr >> 1)
    }

    /// Constructor for address literals. Use in `const` items so an invalid
    /// literal becomes a build error rather than a runtime fault.
    pub const fn from_literal(addr: u8) -> Self {
        assert!(addr != 0 && addr <= 0x7F, "invalid 7-bit I2C address");
        Self(addr)
    }

    /// 7-bit form, as passed to embedded-hal / embassy drivers.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// 8-bit form, as written to the STM32 HAL `DevAddress` argument.
    #[allow(clippy::arithmetic_side_effects)] // 0x7F << 1 fits in u8
    pub const fn eight_bit(self) -> u8 {
        self.0 << 1
    }
}

impl TryFrom<u8> for BusAddress {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

// ── Error bitmask ────────────────────────────────────────────────────────────

/// Error-code bitmask delivered by the error interrupt.
///
/// Bit values match the STM32 HAL `HAL_I2C_ERROR_*` definitions so a raw
/// `ErrorCode` register dump can be wrapped directly. More than one bit may be
/// set for a single event (e.g. `BERR | ARLO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// No error.
    pub const NONE: Self = Self(0x00);
    /// Misplaced START/STOP detected by the peripheral (BERR).
    pub const BUS_ERROR: Self = Self(0x01);
    /// Arbitration lost to another master (ARLO).
    pub const ARBITRATION_LOST: Self = Self(0x02);
    /// Acknowledge failure (AF): device did not ACK address or data.
    pub const NACK: Self = Self(0x04);
    /// Overrun/underrun (OVR).
    pub const OVERRUN: Self = Self(0x08);
    /// DMA transfer error.
    pub const DMA: Self = Self(0x10);
    /// Clock-stretch / transfer timeout.
    pub const TIMEOUT: Self = Self(0x20);

    /// Wrap a raw bitmask.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` when no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Bitwise union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Most significant error in the mask, in triage order
    /// (bus error, arbitration, timeout, NACK, overrun, DMA).
    pub const fn primary(self) -> Option<BusError> {
        if self.contains(Self::BUS_ERROR) {
            Some(BusError::Bus)
        } else if self.contains(Self::ARBITRATION_LOST) {
            Some(BusError::ArbitrationLost)
        } else if self.contains(Self::TIMEOUT) {
            Some(BusError::Timeout)
        } else if self.contains(Self::NACK) {
            Some(BusError::Nack)
        } else if self.contains(Self::OVERRUN) {
            Some(BusError::Overrun)
        } else if self.contains(Self::DMA) {
            Some(BusError::Dma)
        } else {
            None
        }
    }
}

impl core::ops::BitOr for ErrorCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for ErrorCode {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

// ── Bus error ────────────────────────────────────────────────────────────────

/// Failure of a single bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Device did not acknowledge.
    Nack,
    /// Transfer primitive timed out (clock stretched too long).
    Timeout,
    /// Misplaced START/STOP on the bus.
    Bus,
    /// Another master won arbitration.
    ArbitrationLost,
    /// Data overrun/underrun.
    Overrun,
    /// DMA stream reported a transfer error.
    Dma,
    /// A read is already armed on this peripheral.
    Busy,
    /// Peripheral is disabled or mid-reset.
    NotReady,
}

impl BusError {
    /// Short static name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nack => "nack",
            Self::Timeout => "timeout",
            Self::Bus => "bus-error",
            Self::ArbitrationLost => "arbitration-lost",
            Self::Overrun => "overrun",
            Self::Dma => "dma",
            Self::Busy => "busy",
            Self::NotReady => "not-ready",
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}

impl From<BusError> for ErrorCode {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Nack => Self::NACK,
            BusError::Timeout => Self::TIMEOUT,
            BusError::Bus => Self::BUS_ERROR,
            BusError::ArbitrationLost => Self::ARBITRATION_LOST,
            BusError::Overrun => Self::OVERRUN,
            BusError::Dma => Self::DMA,
            // Software-side refusals never reach the wire; report as timeout so
            // they still feed the failure counters.
            BusError::Busy | BusError::NotReady => Self::TIMEOUT,
        }
    }
}

// ── Read request ─────────────────────────────────────────────────────────────

/// One "read `len` bytes from register `register` of device `address`" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadRequest {
    /// Target device.
    pub address: BusAddress,
    /// First register of the burst.
    pub register: u8,
    /// Number of bytes to read.
    pub len: u8,
}

// ── Traits ───────────────────────────────────────────────────────────────────

/// Non-blocking I2C master.
///
/// `start_read` must return immediately: the bytes land later and completion
/// (or failure) is reported through the caller's interrupt glue. The blocking
/// primitives are only used outside the steady-state sweep path (multiplexer
/// select and the liveness probe) and carry their own transfer timeout.
pub trait I2cMaster {
    /// Arm a register read. Returns once the transfer is queued.
    fn start_read(&mut self, request: ReadRequest) -> Result<(), BusError>;

    /// Blocking write of `bytes` to `address`.
    fn transmit(&mut self, address: BusAddress, bytes: &[u8]) -> Result<(), BusError>;

    /// Blocking read of `buffer.len()` bytes from `address` (no register phase).
    fn receive(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<(), BusError>;
}

/// Low-level control of the I2C master peripheral itself.
///
/// These are register-level operations; none of them touch the bus lines.
pub trait PeripheralControl {
    /// Clear the peripheral-enable bit and abort any armed transfer.
    fn disable(&mut self);

    /// Pulse the peripheral's reset line in the clock controller, holding it
    /// asserted for `hold_ms` and settling for `hold_ms` after release.
    fn force_reset(&mut self, hold_ms: u32);

    /// Re-apply the peripheral configuration (speed, addressing, filters) and
    /// enable it.
    fn reinit(&mut self) -> Result<(), BusError>;

    /// Raw BUSY status flag.
    fn is_busy_flag_set(&self) -> bool;

    /// `true` when the driver has no transfer armed.
    fn is_idle(&self) -> bool;

    /// Busy-flag erratum workaround: toggle the peripheral-enable bit so a
    /// BUSY flag latched by a glitch is cleared.
    fn clear_stuck_flag(&mut self);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_form_round_trips() {
        let a = BusAddress::from_eight_bit(0xC0).unwrap();
        assert_eq!(a.get(), 0x60);
        assert_eq!(a.eight_bit(), 0xC0);
    }

    #[test]
    fn zero_and_wide_addresses_rejected() {
        assert_eq!(BusAddress::new(0), Err(AddressError::Zero));
        assert_eq!(BusAddress::new(0x80), Err(AddressError::OutOfRange(0x80)));
        assert_eq!(BusAddress::from_eight_bit(0x01), Err(AddressError::Zero));
    }

    #[test]
    fn primary_error_follows_triage_order() {
        let code = ErrorCode::NACK | ErrorCode::ARBITRATION_LOST;
        assert_eq!(code.primary(), Some(BusError::ArbitrationLost));
        assert_eq!(ErrorCode::NONE.primary(), None);
    }

    #[test]
    fn contains_ignores_empty_mask() {
        assert!(!ErrorCode::NACK.contains(ErrorCode::NONE));
        assert!((ErrorCode::NACK | ErrorCode::DMA).contains(ErrorCode::DMA));
    }
}
