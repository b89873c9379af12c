//! TCA9548A 1-to-8 I2C switch.
//!
//! Reference: TI SCPS207. The only register is the channel-enable byte;
//! see [`crate::acquisition::router`] for the select primitives.

/// 7-bit address with A2..A0 tied low.
pub const ADDRESS: u8 = 0x70;
