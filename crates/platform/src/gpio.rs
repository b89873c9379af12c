//! GPIO control of the I2C bus lines
//!
//! Bus Recovery needs to take SCL and SDA away from the I2C peripheral and
//! drive them by hand as plain open-drain outputs. [`BusLines`] is the minimal
//! capability for that: switch the pin pair between peripheral and GPIO mode,
//! drive each line, and sample SDA.
//!
//! Open-drain semantics: "high" releases the line to the pull-up, "low" pulls
//! it to ground. A slave holding SDA low therefore reads back low even while
//! the master drives it high.

/// Pin state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// High (released, logic 1)
    High,
    /// Low (driven, logic 0)
    Low,
}

impl From<bool> for PinState {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<PinState> for bool {
    fn from(value: PinState) -> Self {
        matches!(value, PinState::High)
    }
}

/// Which block currently owns the SCL/SDA pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineMode {
    /// Alternate function: the I2C peripheral drives the pins.
    Peripheral,
    /// General-purpose open-drain output with pull-up, driven by software.
    Gpio,
}

/// Physical SCL/SDA pair of one bus.
pub trait BusLines {
    /// Error type
    type Error: core::fmt::Debug;

    /// Reconfigure both pins.
    fn set_mode(&mut self, mode: LineMode) -> Result<(), Self::Error>;

    /// Drive SCL (GPIO mode only).
    fn set_scl(&mut self, state: PinState) -> Result<(), Self::Error>;

    /// Drive SDA (GPIO mode only).
    fn set_sda(&mut self, state: PinState) -> Result<(), Self::Error>;

    /// Sample SDA.
    fn sda(&self) -> Result<PinState, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_state_bool_conversions() {
        assert_eq!(PinState::from(true), PinState::High);
        assert_eq!(PinState::from(false), PinState::Low);
        assert!(bool::from(PinState::High));
        assert!(!bool::from(PinState::Low));
    }
}
