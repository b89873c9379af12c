//! Bus Handle and the physical-layer recovery procedures.
//!
//! [`BusHandle`] is the one owned handle to an I2C master: the peripheral
//! driver, the two bus lines (for bit-banging during recovery) and a delay
//! source. It is created at boot and reinitialized in place; nothing else
//! touches the peripheral.
//!
//! # Recovery sequences
//!
//! ```text
//! Bus Recovery   disable ─ lines→GPIO ─ release ─ settle ─ 9×SCL ─ STOP ─ settle
//!                ─ sample SDA ─ lines→AF ─ reinit
//! Forced Reset   disable ─ lines→GPIO ─ release ─ settle ─ 16×SCL ─ 3×STOP ─ settle
//!                ─ sample SDA ─ RCC reset (5 ms) ─ lines→AF ─ reinit ─ toggle PE
//! ```
//!
//! A STOP is SDA rising while SCL is high. Each pulse is a full low/high
//! SCL period so a slave stuck mid-byte sees enough clocks to finish the
//! byte and its ACK bit, then releases SDA.

use embedded_hal::delay::DelayNs;
use heapless::HistoryBuf;
use platform::{
    BusAddress, BusError, BusLines, ErrorCode, I2cMaster, LineMode, PeripheralControl, PinState,
    ReadRequest, RecoveryTiming,
};

use crate::error::RecoveryError;

/// Error codes kept in the handle's history.
pub const ERROR_HISTORY_LEN: usize = 8;

/// Liveness of the handle as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusStatus {
    /// Peripheral configured and usable.
    #[default]
    Ready,
    /// A recovery procedure owns the lines.
    Recovering,
    /// Last recovery or reinit failed.
    Faulted,
}

/// Outcome of a recovery procedure that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryReport {
    /// SCL pulses generated.
    pub pulses: u8,
    /// STOP conditions generated.
    pub stops: u8,
    /// SDA read high after the last STOP.
    pub released: bool,
}

/// Everything the acquisition engine needs from a bus: the master
/// primitives plus the escalation ladder.
pub trait BusPort: I2cMaster {
    /// Lightweight per-transaction reset: disable, RCC-reset the peripheral
    /// alone, reinitialize. Lines are not touched.
    ///
    /// # Errors
    ///
    /// Reinitialization failed.
    fn reset_peripheral(&mut self) -> Result<(), BusError>;

    /// Standard Bus Recovery.
    ///
    /// # Errors
    ///
    /// [`RecoveryError::StillHeld`] if SDA is still low after the STOP; the
    /// peripheral is reinitialized regardless.
    fn recover_bus(&mut self) -> Result<RecoveryReport, RecoveryError>;

    /// Forced Reset. Succeeds even if SDA stays held; the report says so.
    ///
    /// # Errors
    ///
    /// Lines could not be driven or the peripheral did not come back.
    fn force_reset(&mut self) -> Result<RecoveryReport, RecoveryError>;

    /// Peripheral reports BUSY while its driver has nothing armed.
    fn busy_flag_stuck(&self) -> bool;

    /// Remember an error code for diagnostics.
    fn record_error(&mut self, code: ErrorCode);
}

/// Owned I2C master + bus lines + delay.
pub struct BusHandle<P, L, D> {
    peripheral: P,
    lines: L,
    delay: D,
    timing: RecoveryTiming,
    status: BusStatus,
    last_error: ErrorCode,
    history: HistoryBuf<ErrorCode, ERROR_HISTORY_LEN>,
}

impl<P, L, D> BusHandle<P, L, D>
where
    P: I2cMaster + PeripheralControl,
    L: BusLines,
    D: DelayNs,
{
    /// Take ownership of an already-initialized peripheral and its lines.
    pub fn new(peripheral: P, lines: L, delay: D, timing: RecoveryTiming) -> Self {
        Self {
            peripheral,
            lines,
            delay,
            timing,
            status: BusStatus::Ready,
            last_error: ErrorCode::NONE,
            history: HistoryBuf::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> BusStatus {
        self.status
    }

    /// Most recent error code, `NONE` if none yet.
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Recent error codes, oldest first.
    pub fn error_history(&self) -> impl Iterator<Item = &ErrorCode> {
        self.history.oldest_ordered()
    }

    /// Peripheral driver.
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Peripheral driver, mutable.
    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    /// Bus lines.
    pub fn lines(&self) -> &L {
        &self.lines
    }

    fn drive(
        &mut self,
        op: impl FnOnce(&mut L) -> Result<(), L::Error>,
    ) -> Result<(), RecoveryError> {
        op(&mut self.lines).map_err(|_| RecoveryError::Lines)
    }

    fn half_period(&mut self) {
        self.delay.delay_us(self.timing.pulse_half_period_us);
    }

    fn pulse_clock(&mut self, pulses: u8) -> Result<(), RecoveryError> {
        for _ in 0..pulses {
            self.drive(|l| l.set_scl(PinState::Low))?;
            self.half_period();
            self.drive(|l| l.set_scl(PinState::High))?;
            self.half_period();
        }
        Ok(())
    }

    fn stop_condition(&mut self) -> Result<(), RecoveryError> {
        self.drive(|l| l.set_scl(PinState::Low))?;
        self.half_period();
        self.drive(|l| l.set_sda(PinState::Low))?;
        self.half_period();
        self.drive(|l| l.set_scl(PinState::High))?;
        self.half_period();
        self.drive(|l| l.set_sda(PinState::High))?;
        self.half_period();
        Ok(())
    }

    /// Lines to GPIO, clock out a stuck slave, synthesize STOPs. Returns
    /// whether SDA is high afterwards. Leaves the lines in GPIO mode.
    fn clock_out(&mut self, pulses: u8, stops: u8) -> Result<bool, RecoveryError> {
        self.drive(|l| l.set_mode(LineMode::Gpio))?;
        self.drive(|l| l.set_sda(PinState::High))?;
        self.drive(|l| l.set_scl(PinState::High))?;
        self.delay.delay_ms(self.timing.settle_ms);

        self.pulse_clock(pulses)?;
        for _ in 0..stops {
            self.stop_condition()?;
        }
        self.delay.delay_ms(self.timing.settle_ms);

        let sda = self.lines.sda().map_err(|_| RecoveryError::Lines)?;
        Ok(sda == PinState::High)
    }

    /// Hand the lines back to the peripheral and reinitialize it.
    fn restore(&mut self) -> Result<(), RecoveryError> {
        self.drive(|l| l.set_mode(LineMode::Peripheral))?;
        self.peripheral.reinit().map_err(RecoveryError::Reinit)
    }

    fn settle_status(&mut self, outcome: &Result<bool, RecoveryError>) {
        self.status = match outcome {
            Ok(true) => BusStatus::Ready,
            _ => BusStatus::Faulted,
        };
    }
}

impl<P, L, D> I2cMaster for BusHandle<P, L, D>
where
    P: I2cMaster + PeripheralControl,
    L: BusLines,
    D: DelayNs,
{
    fn start_read(&mut self, request: ReadRequest) -> Result<(), BusError> {
        self.peripheral.start_read(request)
    }

    fn transmit(&mut self, address: BusAddress, bytes: &[u8]) -> Result<(), BusError> {
        self.peripheral.transmit(address, bytes)
    }

    fn receive(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<(), BusError> {
        self.peripheral.receive(address, buffer)
    }
}

impl<P, L, D> BusPort for BusHandle<P, L, D>
where
    P: I2cMaster + PeripheralControl,
    L: BusLines,
    D: DelayNs,
{
    fn reset_peripheral(&mut self) -> Result<(), BusError> {
        self.peripheral.disable();
        self.peripheral.force_reset(self.timing.reset_hold_ms);
        let result = self.peripheral.reinit();
        self.status = if result.is_ok() {
            BusStatus::Ready
        } else {
            BusStatus::Faulted
        };
        result
    }

    fn recover_bus(&mut self) -> Result<RecoveryReport, RecoveryError> {
        let pulses = self.timing.recovery_pulses;
        self.status = BusStatus::Recovering;
        self.peripheral.disable();

        let released = self.clock_out(pulses, 1);
        // The peripheral must come back even when clocking failed.
        let restored = self.restore();
        let outcome = released.and_then(|r| restored.map(|()| r));
        self.settle_status(&outcome);

        if outcome? {
            Ok(RecoveryReport {
                pulses,
                stops: 1,
                released: true,
            })
        } else {
            Err(RecoveryError::StillHeld)
        }
    }

    fn force_reset(&mut self) -> Result<RecoveryReport, RecoveryError> {
        let pulses = self.timing.forced_pulses;
        let stops = self.timing.forced_stop_attempts;
        self.status = BusStatus::Recovering;
        self.peripheral.disable();

        let released = self.clock_out(pulses, stops);
        self.peripheral.force_reset(self.timing.forced_reset_hold_ms);
        let restored = self.restore();
        self.peripheral.clear_stuck_flag();

        let outcome = released.and_then(|r| restored.map(|()| r));
        // Forced Reset is the last rung: a held SDA is reported, not fatal.
        self.status = if outcome.is_ok() {
            BusStatus::Ready
        } else {
            BusStatus::Faulted
        };
        Ok(RecoveryReport {
            pulses,
            stops,
            released: outcome?,
        })
    }

    fn busy_flag_stuck(&self) -> bool {
        self.peripheral.is_busy_flag_set() && self.peripheral.is_idle()
    }

    fn record_error(&mut self, code: ErrorCode) {
        self.last_error = code;
        self.history.write(code);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{LineEvent, MockDelay, MockI2c, MockLines};

    type TestBus = BusHandle<MockI2c, MockLines, MockDelay>;

    fn bus(lines: MockLines) -> TestBus {
        BusHandle::new(MockI2c::new(), lines, MockDelay::new(), RecoveryTiming::default())
    }

    // ── Test A ────────────────────────────────────────────────────────────────
    /// Bus Recovery on a free bus: 9 pulses, 1 STOP, lines handed back.
    #[test]
    fn test_recovery_sequence_on_idle_bus() {
        let mut b = bus(MockLines::new());
        let report = b.recover_bus().unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                pulses: 9,
                stops: 1,
                released: true
            }
        );
        assert_eq!(b.lines().scl_pulses(), 9);
        assert_eq!(b.lines().stop_conditions(), 1);
        assert_eq!(b.lines().mode(), LineMode::Peripheral);
        assert_eq!(b.lines().events().first(), Some(&LineEvent::Mode(LineMode::Gpio)));
        assert_eq!(b.peripheral().disables(), 1);
        assert_eq!(b.peripheral().reinits(), 1);
        assert_eq!(b.status(), BusStatus::Ready);
    }

    // ── Test B ────────────────────────────────────────────────────────────────
    /// A slave that needs 5 clocks is freed by standard recovery.
    #[test]
    fn test_recovery_frees_stuck_slave() {
        let mut b = bus(MockLines::with_stuck_slave(Some(5)));
        assert!(b.recover_bus().unwrap().released);
    }

    // ── Test C ────────────────────────────────────────────────────────────────
    /// A slave that never lets go: StillHeld, but the peripheral is back.
    #[test]
    fn test_recovery_reports_still_held() {
        let mut b = bus(MockLines::with_stuck_slave(None));
        assert_eq!(b.recover_bus(), Err(RecoveryError::StillHeld));
        assert_eq!(b.lines().mode(), LineMode::Peripheral);
        assert_eq!(b.peripheral().reinits(), 1);
        assert_eq!(b.status(), BusStatus::Faulted);
    }

    // ── Test D ────────────────────────────────────────────────────────────────
    /// Forced Reset: 16 pulses, 3 STOPs, 5 ms RCC hold, PE toggled.
    #[test]
    fn test_forced_reset_sequence() {
        let mut b = bus(MockLines::new());
        b.peripheral_mut().set_busy_flag(true);
        assert!(b.busy_flag_stuck());

        let report = b.force_reset().unwrap();
        assert_eq!(report.pulses, 16);
        assert_eq!(report.stops, 3);
        assert_eq!(b.lines().scl_pulses(), 16);
        assert_eq!(b.lines().stop_conditions(), 3);
        assert_eq!(b.peripheral().force_resets(), 1);
        assert_eq!(b.peripheral().last_reset_hold_ms(), 5);
        assert_eq!(b.peripheral().stuck_flag_clears(), 1);
        assert!(!b.busy_flag_stuck());
    }

    // ── Test E ────────────────────────────────────────────────────────────────
    /// Lightweight reset never touches the lines.
    #[test]
    fn test_peripheral_reset_leaves_lines_alone() {
        let mut b = bus(MockLines::new());
        b.reset_peripheral().unwrap();
        assert!(b.lines().events().is_empty());
        assert_eq!(b.peripheral().force_resets(), 1);
        assert_eq!(b.peripheral().last_reset_hold_ms(), 2);
        assert_eq!(b.peripheral().reinits(), 1);
    }

    // ── Test F ────────────────────────────────────────────────────────────────
    /// Error history keeps the last eight codes.
    #[test]
    fn test_error_history_is_bounded() {
        let mut b = bus(MockLines::new());
        for bits in 1..=10u32 {
            b.record_error(ErrorCode::from_bits(bits));
        }
        assert_eq!(b.last_error(), ErrorCode::from_bits(10));
        let kept: heapless::Vec<u32, 8> = b.error_history().map(|c| c.bits()).collect();
        assert_eq!(kept.as_slice(), &[3, 4, 5, 6, 7, 8, 9, 10]);
    }

    // ── Test G ────────────────────────────────────────────────────────────────
    /// Busy flag while a read is armed is not divergence.
    #[test]
    fn test_busy_with_armed_read_is_not_stuck() {
        let mut b = bus(MockLines::new());
        b.start_read(ReadRequest {
            address: BusAddress::from_literal(0x60),
            register: 0x09,
            len: 2,
        })
        .unwrap();
        b.peripheral_mut().set_busy_flag(true);
        assert!(!b.busy_flag_stuck());
    }
}
