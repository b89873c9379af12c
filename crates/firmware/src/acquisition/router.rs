//! Multiplexer channel routing.
//!
//! A TCA9548A has a single control register: writing a byte with bit `n` set
//! connects downstream channel `n`. Writing a one-hot mask guarantees only one
//! channel is connected at a time, so two identically-addressed devices on
//! different channels never answer together.
//!
//! The write is not read back. The very next transaction goes to the device
//! behind the mux; if the select did not take, that transaction NACKs and the
//! normal abort path handles it.

use embedded_hal::i2c::I2c;
use platform::{BusAddress, BusError, I2cMaster};

use super::plan::{MuxChannel, MuxRoute};

/// Connect only `channel` on multiplexer `mux` (sweep path).
///
/// # Errors
///
/// Whatever the single-byte transmit returns.
pub fn select_channel<M: I2cMaster + ?Sized>(
    bus: &mut M,
    mux: BusAddress,
    channel: MuxChannel,
) -> Result<(), BusError> {
    bus.transmit(mux, &[channel.mask()])
}

/// [`select_channel`] for a route taken from the plan.
///
/// # Errors
///
/// As [`select_channel`].
pub fn select_route<M: I2cMaster + ?Sized>(bus: &mut M, route: MuxRoute) -> Result<(), BusError> {
    select_channel(bus, route.mux, route.channel)
}

/// Blocking form over an `embedded-hal` bus, used during bring-up before the
/// sweep engine owns the peripheral.
///
/// # Errors
///
/// The driver's own error type.
pub fn select_route_blocking<I: I2c>(i2c: &mut I, route: MuxRoute) -> Result<(), I::Error> {
    i2c.write(route.mux.get(), &[route.channel.mask()])
}

/// Disconnect every downstream channel.
///
/// # Errors
///
/// The driver's own error type.
pub fn deselect_all_blocking<I: I2c>(i2c: &mut I, mux: BusAddress) -> Result<(), I::Error> {
    i2c.write(mux.get(), &[0x00])
}
