//! Hardware Abstraction Layer (HAL) for the I2C sensor hub
//!
//! This crate provides trait-based abstractions for the bus hardware the
//! acquisition engine drives, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate: engine, health, sensors)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Abstractions
//!
//! - [`peripheral`] - non-blocking I2C master, peripheral control, address and
//!   error-code types
//! - [`gpio`] - SCL/SDA line control for bus recovery
//! - [`clock`] - monotonic millisecond tick
//! - [`dma_safety`] - DMA-reachable memory markers for the landing buffer
//! - [`config`] - application constants and default tunables
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing); exposes [`mocks`]
//! - `hardware`: Physical hardware implementations
//! - `defmt`: Enable defmt::Format derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{BusAddress, I2cMaster, ReadRequest};
//!
//! fn arm<M: I2cMaster>(m: &mut M) {
//!     let request = ReadRequest { address: BusAddress::from_literal(0x60), register: 0x09, len: 2 };
//!     let _ = m.start_read(request);
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::missing_panics_doc)] // const-context asserts on address literals
#![allow(clippy::must_use_candidate)] // hardware accessors - callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod clock;
pub mod config;
pub mod dma_safety;
pub mod gpio;
pub mod mocks;
pub mod peripheral;

// Re-export clock types
pub use clock::{Clock, EmbassyClock};

// Re-export configuration types
pub use config::{HealthPolicy, RecoveryTiming};

// Re-export GPIO types
pub use gpio::{BusLines, LineMode, PinState};

// Re-export peripheral types
pub use peripheral::{
    AddressError, BusAddress, BusError, ErrorCode, I2cMaster, PeripheralControl, ReadRequest,
};
