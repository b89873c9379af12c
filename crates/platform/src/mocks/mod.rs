//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests. Every mock records what was asked
//! of it so tests can assert on bus traffic and pin edges.

#![cfg(any(test, feature = "std"))]

use core::cell::Cell;

use crate::clock::Clock;
use crate::gpio::{BusLines, LineMode, PinState};
use crate::peripheral::{BusAddress, BusError, I2cMaster, PeripheralControl, ReadRequest};

/// Capacity of every mock log. Entries beyond this are dropped silently so
/// long-running tests do not fail on log overflow.
pub const LOG_CAPACITY: usize = 512;

// ── MockI2c ──────────────────────────────────────────────────────────────────

/// One blocking write recorded by [`MockI2c`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Target address.
    pub address: BusAddress,
    /// Bytes written (first 4 kept).
    pub bytes: heapless::Vec<u8, 4>,
}

/// Mock I2C master
///
/// `start_read` only records the request; the test decides when the
/// transfer "completes" by calling [`MockI2c::complete`] and then feeding the
/// engine's completion entry point.
#[derive(Debug, Default)]
pub struct MockI2c {
    armed: Option<ReadRequest>,
    arms: heapless::Vec<ReadRequest, LOG_CAPACITY>,
    transmits: heapless::Vec<Transmit, LOG_CAPACITY>,
    probes: u32,
    arm_failures: u32,
    arm_error: Option<BusError>,
    transmit_error: Option<BusError>,
    probe_error: Option<BusError>,
    busy_flag: bool,
    disabled: bool,
    disables: u32,
    force_resets: u32,
    last_reset_hold_ms: u32,
    reinits: u32,
    stuck_flag_clears: u32,
}

impl MockI2c {
    /// Create new mock master, idle and enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `start_read` fail with `error`.
    pub fn fail_next_arms(&mut self, count: u32, error: BusError) {
        self.arm_failures = count;
        self.arm_error = Some(error);
    }

    /// Make every blocking `transmit` fail with `error` (`None` to clear).
    pub fn set_transmit_error(&mut self, error: Option<BusError>) {
        self.transmit_error = error;
    }

    /// Make every blocking `receive` fail with `error` (`None` to clear).
    pub fn set_probe_error(&mut self, error: Option<BusError>) {
        self.probe_error = error;
    }

    /// Latch the peripheral BUSY flag, as the silicon erratum does.
    pub fn set_busy_flag(&mut self, busy: bool) {
        self.busy_flag = busy;
    }

    /// Finish the armed transfer. Returns the request that was in flight.
    pub fn complete(&mut self) -> Option<ReadRequest> {
        self.armed.take()
    }

    /// Request currently armed.
    pub fn armed(&self) -> Option<ReadRequest> {
        self.armed
    }

    /// Every request armed so far, in order.
    pub fn arms(&self) -> &[ReadRequest] {
        &self.arms
    }

    /// Every blocking write so far, in order.
    pub fn transmits(&self) -> &[Transmit] {
        &self.transmits
    }

    /// Number of blocking `receive` calls (probes).
    pub fn probes(&self) -> u32 {
        self.probes
    }

    /// Number of `disable` calls.
    pub fn disables(&self) -> u32 {
        self.disables
    }

    /// Number of `force_reset` calls.
    pub fn force_resets(&self) -> u32 {
        self.force_resets
    }

    /// Hold time passed to the last `force_reset`.
    pub fn last_reset_hold_ms(&self) -> u32 {
        self.last_reset_hold_ms
    }

    /// Number of `reinit` calls.
    pub fn reinits(&self) -> u32 {
        self.reinits
    }

    /// Number of `clear_stuck_flag` calls.
    pub fn stuck_flag_clears(&self) -> u32 {
        self.stuck_flag_clears
    }

    /// Forget all recorded traffic.
    pub fn clear_logs(&mut self) {
        self.arms.clear();
        self.transmits.clear();
    }
}

impl I2cMaster for MockI2c {
    fn start_read(&mut self, request: ReadRequest) -> Result<(), BusError> {
        if self.arm_failures > 0 {
            self.arm_failures = self.arm_failures.saturating_sub(1);
            return Err(self.arm_error.unwrap_or(BusError::Timeout));
        }
        if self.disabled {
            return Err(BusError::NotReady);
        }
        if self.armed.is_some() {
            return Err(BusError::Busy);
        }
        self.armed = Some(request);
        let _ = self.arms.push(request);
        Ok(())
    }

    fn transmit(&mut self, address: BusAddress, bytes: &[u8]) -> Result<(), BusError> {
        if let Some(err) = self.transmit_error {
            return Err(err);
        }
        let mut kept = heapless::Vec::new();
        for b in bytes.iter().take(4) {
            let _ = kept.push(*b);
        }
        let _ = self.transmits.push(Transmit {
            address,
            bytes: kept,
        });
        Ok(())
    }

    fn receive(&mut self, _address: BusAddress, buffer: &mut [u8]) -> Result<(), BusError> {
        self.probes = self.probes.saturating_add(1);
        if let Some(err) = self.probe_error {
            return Err(err);
        }
        buffer.fill(0);
        Ok(())
    }
}

impl PeripheralControl for MockI2c {
    fn disable(&mut self) {
        self.disabled = true;
        self.armed = None;
        self.disables = self.disables.saturating_add(1);
    }

    fn force_reset(&mut self, hold_ms: u32) {
        // An RCC reset clears every status flag, BUSY included.
        self.busy_flag = false;
        self.armed = None;
        self.last_reset_hold_ms = hold_ms;
        self.force_resets = self.force_resets.saturating_add(1);
    }

    fn reinit(&mut self) -> Result<(), BusError> {
        self.disabled = false;
        self.reinits = self.reinits.saturating_add(1);
        Ok(())
    }

    fn is_busy_flag_set(&self) -> bool {
        self.busy_flag
    }

    fn is_idle(&self) -> bool {
        self.armed.is_none()
    }

    fn clear_stuck_flag(&mut self) {
        self.busy_flag = false;
        self.stuck_flag_clears = self.stuck_flag_clears.saturating_add(1);
    }
}

// ── MockLines ────────────────────────────────────────────────────────────────

/// One edge or mode change recorded by [`MockLines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Pins switched owner.
    Mode(LineMode),
    /// SCL driven.
    Scl(PinState),
    /// SDA driven.
    Sda(PinState),
}

/// Mock SCL/SDA pair with an optional misbehaving slave.
///
/// A slave "holding SDA low" keeps the line low until it has seen
/// `release_after` SCL rising edges in GPIO mode (`None` = never releases).
#[derive(Debug)]
pub struct MockLines {
    mode: LineMode,
    scl: PinState,
    sda_driven: PinState,
    sda_held: bool,
    release_after: Option<u32>,
    rising_edges: u32,
    events: heapless::Vec<LineEvent, LOG_CAPACITY>,
}

impl Default for MockLines {
    fn default() -> Self {
        Self {
            mode: LineMode::Peripheral,
            scl: PinState::High,
            sda_driven: PinState::High,
            sda_held: false,
            release_after: None,
            rising_edges: 0,
            events: heapless::Vec::new(),
        }
    }
}

impl MockLines {
    /// Idle bus, lines owned by the peripheral.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with a slave holding SDA low until it sees `release_after` clocks.
    pub fn with_stuck_slave(release_after: Option<u32>) -> Self {
        Self {
            sda_held: true,
            release_after,
            ..Self::default()
        }
    }

    /// Current pin owner.
    pub fn mode(&self) -> LineMode {
        self.mode
    }

    /// Recorded events.
    pub fn events(&self) -> &[LineEvent] {
        &self.events
    }

    /// SCL rising edges generated in GPIO mode.
    pub fn scl_pulses(&self) -> u32 {
        self.rising_edges
    }

    /// STOP conditions: SDA driven low→high while SCL is high.
    pub fn stop_conditions(&self) -> usize {
        let mut scl = PinState::High;
        let mut sda = PinState::High;
        let mut stops = 0usize;
        for ev in &self.events {
            match *ev {
                LineEvent::Scl(s) => scl = s,
                LineEvent::Sda(s) => {
                    if sda == PinState::Low && s == PinState::High && scl == PinState::High {
                        stops = stops.saturating_add(1);
                    }
                    sda = s;
                }
                LineEvent::Mode(_) => {}
            }
        }
        stops
    }

    fn record(&mut self, ev: LineEvent) {
        let _ = self.events.push(ev);
    }
}

impl BusLines for MockLines {
    type Error = core::convert::Infallible;

    fn set_mode(&mut self, mode: LineMode) -> Result<(), Self::Error> {
        self.mode = mode;
        self.record(LineEvent::Mode(mode));
        Ok(())
    }

    fn set_scl(&mut self, state: PinState) -> Result<(), Self::Error> {
        if self.mode == LineMode::Gpio && self.scl == PinState::Low && state == PinState::High {
            self.rising_edges = self.rising_edges.saturating_add(1);
            if let Some(n) = self.release_after {
                if self.rising_edges >= n {
                    self.sda_held = false;
                }
            }
        }
        self.scl = state;
        self.record(LineEvent::Scl(state));
        Ok(())
    }

    fn set_sda(&mut self, state: PinState) -> Result<(), Self::Error> {
        self.sda_driven = state;
        self.record(LineEvent::Sda(state));
        Ok(())
    }

    fn sda(&self) -> Result<PinState, Self::Error> {
        if self.sda_held {
            Ok(PinState::Low)
        } else {
            Ok(self.sda_driven)
        }
    }
}

// ── MockDelay ────────────────────────────────────────────────────────────────

/// Delay that returns immediately and accumulates the requested time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    /// Create new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time requested so far, in microseconds.
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns = self.total_ns.saturating_add(u64::from(ns));
    }
}

// ── ManualClock ──────────────────────────────────────────────────────────────

/// Clock advanced explicitly by the test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    /// Clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    /// Move time forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;

    const DEV: BusAddress = BusAddress::from_literal(0x60);

    fn req() -> ReadRequest {
        ReadRequest {
            address: DEV,
            register: 0x09,
            len: 2,
        }
    }

    #[test]
    fn second_arm_while_armed_is_busy() {
        let mut i2c = MockI2c::new();
        i2c.start_read(req()).unwrap();
        assert_eq!(i2c.start_read(req()), Err(BusError::Busy));
        assert_eq!(i2c.complete(), Some(req()));
        assert!(i2c.start_read(req()).is_ok());
    }

    #[test]
    fn injected_arm_failures_are_consumed() {
        let mut i2c = MockI2c::new();
        i2c.fail_next_arms(2, BusError::Nack);
        assert_eq!(i2c.start_read(req()), Err(BusError::Nack));
        assert_eq!(i2c.start_read(req()), Err(BusError::Nack));
        assert!(i2c.start_read(req()).is_ok());
    }

    #[test]
    fn disabled_master_refuses_until_reinit() {
        let mut i2c = MockI2c::new();
        i2c.disable();
        assert_eq!(i2c.start_read(req()), Err(BusError::NotReady));
        i2c.reinit().unwrap();
        assert!(i2c.start_read(req()).is_ok());
    }

    #[test]
    fn stuck_slave_releases_after_clocks() {
        let mut lines = MockLines::with_stuck_slave(Some(3));
        lines.set_mode(LineMode::Gpio).unwrap();
        for _ in 0..3 {
            assert_eq!(lines.sda().unwrap(), PinState::Low);
            lines.set_scl(PinState::Low).unwrap();
            lines.set_scl(PinState::High).unwrap();
        }
        assert_eq!(lines.sda().unwrap(), PinState::High);
        assert_eq!(lines.scl_pulses(), 3);
    }

    #[test]
    fn stop_condition_detected() {
        let mut lines = MockLines::new();
        lines.set_mode(LineMode::Gpio).unwrap();
        lines.set_sda(PinState::Low).unwrap();
        lines.set_scl(PinState::High).unwrap();
        lines.set_sda(PinState::High).unwrap();
        assert_eq!(lines.stop_conditions(), 1);
    }

    #[test]
    fn mock_delay_accumulates() {
        let mut d = MockDelay::new();
        d.delay_ms(2);
        d.delay_us(500);
        assert_eq!(d.total_us(), 2_500);
    }

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(100);
        c.advance(50);
        assert_eq!(c.now_ms(), 150);
    }
}
