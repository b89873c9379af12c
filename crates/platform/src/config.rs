//! Application configuration and constants
//!
//! This module defines central configuration values used across the application.
//! All naming, bus tunables and recovery timing should reference these constants
//! rather than hardcoding values.
//!
//! The failure threshold and decay values were tuned empirically on the bench
//! and are not derived from first principles; they are exposed through
//! [`HealthPolicy`] so a deployment can override them.

use crate::peripheral::BusAddress;

/// The application name
pub const APP_NAME: &str = "Sensor Hub";

/// The application type/category
pub const APP_TYPE: &str = "I2C sensor acquisition";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Full application title (name + type)
pub const fn app_title() -> &'static str {
    APP_NAME
}

// ── Health policy defaults ───────────────────────────────────────────────────

/// Consecutive failures at which full Bus Recovery is triggered.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 50;

/// Successes (while failures are outstanding) that earn one decrement of the
/// consecutive-failure counter.
pub const DEFAULT_SUCCESS_DECAY_THRESHOLD: u32 = 10;

/// Period of the liveness probe.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;

/// 7-bit address of the device probed for liveness (TCA9548A multiplexer,
/// present on every board revision).
pub const DEFAULT_PROBE_ADDRESS: u8 = 0x70;

// ── Recovery timing defaults ─────────────────────────────────────────────────

/// SCL pulses for standard Bus Recovery. Nine clocks let any slave finish the
/// byte plus ACK it was transmitting when the master lost track.
pub const RECOVERY_PULSES: u8 = 9;

/// SCL pulses for Forced Reset.
pub const FORCED_RESET_PULSES: u8 = 16;

/// STOP conditions synthesised by Forced Reset.
pub const FORCED_RESET_STOP_ATTEMPTS: u8 = 3;

/// Half-period of a manual SCL pulse (≈500 Hz, well under any slave's limit).
pub const PULSE_HALF_PERIOD_US: u32 = 1_000;

/// Settle time after releasing the lines and after the STOP.
pub const LINE_SETTLE_MS: u32 = 2;

/// Reset hold for the lightweight per-transaction reset.
pub const PERIPHERAL_RESET_HOLD_MS: u32 = 2;

/// Reset hold for Forced Reset.
pub const FORCED_RESET_HOLD_MS: u32 = 5;

/// Health accounting and escalation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthPolicy {
    /// Consecutive failures that trigger Bus Recovery (and mark the bus
    /// unhealthy).
    pub failure_threshold: u32,
    /// Successes needed to decay the consecutive counter by one.
    pub success_decay_threshold: u32,
    /// Liveness probe period.
    pub probe_interval_ms: u64,
    /// Device the probe reads one byte from.
    pub probe_address: BusAddress,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_decay_threshold: DEFAULT_SUCCESS_DECAY_THRESHOLD,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            probe_address: BusAddress::from_literal(DEFAULT_PROBE_ADDRESS),
        }
    }
}

/// Pulse counts and delays for the physical recovery procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryTiming {
    /// Pulses for Bus Recovery.
    pub recovery_pulses: u8,
    /// Pulses for Forced Reset.
    pub forced_pulses: u8,
    /// STOP attempts for Forced Reset.
    pub forced_stop_attempts: u8,
    /// SCL half-period in microseconds.
    pub pulse_half_period_us: u32,
    /// Settle after line release / STOP, milliseconds.
    pub settle_ms: u32,
    /// Lightweight reset hold, milliseconds.
    pub reset_hold_ms: u32,
    /// Forced reset hold, milliseconds.
    pub forced_reset_hold_ms: u32,
}

impl Default for RecoveryTiming {
    fn default() -> Self {
        Self {
            recovery_pulses: RECOVERY_PULSES,
            forced_pulses: FORCED_RESET_PULSES,
            forced_stop_attempts: FORCED_RESET_STOP_ATTEMPTS,
            pulse_half_period_us: PULSE_HALF_PERIOD_US,
            settle_ms: LINE_SETTLE_MS,
            reset_hold_ms: PERIPHERAL_RESET_HOLD_MS,
            forced_reset_hold_ms: FORCED_RESET_HOLD_MS,
        }
    }
}
