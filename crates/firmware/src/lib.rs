//! Sensor Hub Firmware
//!
//! Interrupt-driven I2C acquisition for an STM32F407 sensor board: a VCNL4040
//! light/proximity sensor, an ICM-42688 IMU and eight BME280s behind a
//! TCA9548A multiplexer, all on one bus.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (main.rs: bring-up, acquisition task, monitor loop)
//!         ↓
//! Acquisition (plan, scheduler, router, result store, engine)
//!         ↓
//! Bus (handle + recovery procedures, health monitor)
//!         ↓
//! Platform HAL (traits, mocks) / hal::stm32 (Embassy + PAC)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32F407 target (embassy, defmt)
//! - `std` - Host builds with `tracing` logging
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```
//!
//! ## Host tests
//!
//! ```bash
//! cargo test -p firmware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]

#[macro_use]
#[allow(unused_macros)]
mod log;

pub mod acquisition;
pub mod boot;
pub mod bus;
pub mod error;
pub mod exception_handlers;
pub mod hal;
pub mod sensors;

// Re-export key types
pub use acquisition::{
    AcquisitionConfig, AcquisitionEngine, DevicePlan, Maintenance, ResultFrame, SharedEngine,
};
pub use bus::{BusHandle, BusPort, HealthStats};
pub use error::{Busy, ConfigurationFault, FaultClass, RecoveryError};
