//! Acquisition engine: the sweep scheduler bound to a bus, the raw landing
//! buffers, the result store and the health monitor.
//!
//! # Call sites
//!
//! ```text
//! completion interrupt ─▶ on_transfer_complete ─▶ transition ─▶ arm next / publish
//! error interrupt      ─▶ on_transfer_error    ─▶ transition ─▶ abort + peripheral reset
//! foreground loop      ─▶ start_sweep / front_frame / service (recovery, probe)
//! ```
//!
//! The engine never blocks on the bus inside the interrupt-context entry
//! points: arming a read returns immediately and the only blocking transfers
//! on that path are the one-byte multiplexer select and, at a sweep boundary,
//! an owed one-byte health probe. Bus Recovery and Forced
//! Reset are millisecond-scale and run only from [`AcquisitionEngine::service`]
//! or the explicit diagnostic calls.
//!
//! One engine drives one bus. A second bus is a second engine; they share
//! nothing.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use platform::dma_safety::MAX_READ_LEN;
use platform::{BusError, ErrorCode, HealthPolicy, ReadRequest};

use super::frame::{Field, ResultFrame};
use super::plan::{DevicePlan, PlanStep, MAX_PLAN_STEPS, MAX_STEPS_PER_DEVICE};
use super::router;
use super::scheduler::{transition, AbortCause, Action, Event, SweepState};
use super::store::ResultStore;
use crate::bus::handle::{BusPort, RecoveryReport};
use crate::bus::health::{HealthMonitor, HealthStats};
use crate::error::{Busy, ConfigurationFault, RecoveryError};
use crate::sensors;

/// Engine shared between interrupt-context callbacks and the foreground.
///
/// Every access is a short critical section; the bus itself is owned by
/// whoever delivers the interrupts.
pub type SharedEngine = Mutex<CriticalSectionRawMutex, RefCell<Option<AcquisitionEngine>>>;

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    /// Start the next sweep as soon as one publishes (continuous mode).
    pub restart_on_complete: bool,
    /// Failure threshold, decay and probe settings.
    pub health: HealthPolicy,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            restart_on_complete: true,
            health: HealthPolicy::default(),
        }
    }
}

/// What [`AcquisitionEngine::service`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Maintenance {
    /// Nothing was due.
    Idle,
    /// Probe answered.
    ProbeOk,
    /// Probe failed; counted like any other failure.
    ProbeFailed(BusError),
    /// Bus Recovery released the bus.
    Recovered(RecoveryReport),
    /// Forced Reset ran, after a recovery that left SDA held or on busy-flag
    /// divergence.
    ForcedReset(RecoveryReport),
    /// The lines or the peripheral could not be driven.
    RecoveryFailed(RecoveryError),
}

#[derive(Debug, Clone, Copy)]
struct RawBuffer {
    bytes: [u8; MAX_READ_LEN],
    len: usize,
    valid: bool,
}

impl RawBuffer {
    const EMPTY: Self = Self {
        bytes: [0; MAX_READ_LEN],
        len: 0,
        valid: false,
    };

    fn data(&self) -> Option<&[u8]> {
        if self.valid {
            self.bytes.get(..self.len)
        } else {
            None
        }
    }

    fn fill(&mut self, data: &[u8]) -> bool {
        match self.bytes.get_mut(..data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                self.len = data.len();
                self.valid = true;
                true
            }
            None => false,
        }
    }
}

/// Sweep scheduler, landing buffers, result store and health record for one bus.
#[derive(Debug)]
pub struct AcquisitionEngine {
    plan: DevicePlan,
    config: AcquisitionConfig,
    state: SweepState,
    raw: [RawBuffer; MAX_PLAN_STEPS],
    store: ResultStore,
    health: HealthMonitor,
    sweep_seq: u32,
    complete: bool,
    recovery_pending: bool,
    last_abort: Option<AbortCause>,
    next_probe_at_ms: u64,
    probe_owed: bool,
}

impl AcquisitionEngine {
    /// Engine over `plan`, idle, with no published frame.
    ///
    /// # Errors
    ///
    /// The plan's first invalid descriptor.
    pub fn new(plan: DevicePlan, config: AcquisitionConfig) -> Result<Self, ConfigurationFault> {
        plan.validate()?;
        Ok(Self {
            plan,
            config,
            state: SweepState::Idle,
            raw: [RawBuffer::EMPTY; MAX_PLAN_STEPS],
            store: ResultStore::new(),
            health: HealthMonitor::new(config.health),
            sweep_seq: 0,
            complete: false,
            recovery_pending: false,
            last_abort: None,
            next_probe_at_ms: config.health.probe_interval_ms,
            probe_owed: false,
        })
    }

    /// Device plan being swept.
    pub fn plan(&self) -> &DevicePlan {
        &self.plan
    }

    /// Scheduler position.
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// `true` while a read is armed.
    pub fn is_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Sequence number of the sweep started most recently.
    pub fn sweep_seq(&self) -> u32 {
        self.sweep_seq
    }

    /// Why the last sweep stopped early, if it did.
    pub fn last_abort(&self) -> Option<AbortCause> {
        self.last_abort
    }

    /// `true` when Bus Recovery is due at the next [`service`](Self::service).
    pub fn is_recovery_pending(&self) -> bool {
        self.recovery_pending
    }

    // ── Consumer surface ─────────────────────────────────────────────────────

    /// Begin a sweep from step 0.
    ///
    /// # Errors
    ///
    /// [`Busy`] if a sweep is already in flight; state is left untouched.
    pub fn start_sweep<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Result<(), Busy> {
        let (state, action) = transition(self.state, Event::Start, self.plan.step_count());
        if action == Action::Reject {
            return Err(Busy);
        }
        self.sweep_seq = self.sweep_seq.wrapping_add(1);
        for buf in &mut self.raw {
            buf.valid = false;
        }
        self.state = state;
        self.apply(bus, action, now_ms);
        Ok(())
    }

    /// `true` once a sweep reached `Done`, successfully or not. Sticky until
    /// [`clear_completion_flags`](Self::clear_completion_flags).
    pub fn is_sweep_complete(&self) -> bool {
        self.complete
    }

    /// Acknowledge the completed sweep.
    pub fn clear_completion_flags(&mut self) {
        self.complete = false;
    }

    /// Copy of the most recently published frame; `None` before the first
    /// sweep completes.
    pub fn front_frame(&self) -> Option<ResultFrame> {
        self.store.front().cloned()
    }

    // ── Interrupt-context entry points ───────────────────────────────────────

    /// Transfer-complete interrupt: `data` is what landed for the armed step.
    ///
    /// A completion with fewer bytes than the step asked for is treated as a
    /// DMA error.
    pub fn on_transfer_complete<B: BusPort + ?Sized>(
        &mut self,
        bus: &mut B,
        data: &[u8],
        now_ms: u64,
    ) {
        let SweepState::Step(index) = self.state else {
            debug!("completion with no sweep in flight ignored");
            return;
        };
        let landed = self
            .plan
            .step(index)
            .and_then(|step| data.get(..usize::from(step.read.len)))
            .zip(self.raw.get_mut(index))
            .is_some_and(|(bytes, buf)| buf.fill(bytes));
        if !landed {
            self.on_transfer_error(bus, ErrorCode::DMA, now_ms);
            return;
        }
        self.health.record_success(now_ms);

        let (state, action) =
            transition(self.state, Event::TransferComplete, self.plan.step_count());
        self.state = state;
        self.apply(bus, action, now_ms);
    }

    /// Error interrupt with the peripheral's error-code mask.
    pub fn on_transfer_error<B: BusPort + ?Sized>(
        &mut self,
        bus: &mut B,
        code: ErrorCode,
        now_ms: u64,
    ) {
        let (state, action) =
            transition(self.state, Event::TransferError(code), self.plan.step_count());
        self.state = state;
        self.apply(bus, action, now_ms);
    }

    fn apply<B: BusPort + ?Sized>(&mut self, bus: &mut B, action: Action, now_ms: u64) {
        match action {
            Action::None | Action::Reject => {}
            Action::Arm(index) => self.arm(bus, index, now_ms),
            Action::Publish => self.publish(bus, now_ms),
            Action::Abort(cause) => self.abort(bus, cause),
        }
    }

    fn arm<B: BusPort + ?Sized>(&mut self, bus: &mut B, index: usize, now_ms: u64) {
        let issued = match self.plan.step(index) {
            Some(step) => issue(bus, step),
            None => Err(BusError::NotReady),
        };
        if let Err(e) = issued {
            let (state, action) =
                transition(self.state, Event::ArmFailed(e), self.plan.step_count());
            self.state = state;
            self.apply(bus, action, now_ms);
        }
    }

    fn publish<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) {
        let seq = self.sweep_seq;
        let back = self.store.back_mut();
        back.sweep = seq;

        for (index, device) in self.plan.devices().iter().enumerate() {
            let Some(range) = self.plan.step_range(index) else {
                continue;
            };
            let mut steps: Vec<&[u8], MAX_STEPS_PER_DEVICE> = Vec::new();
            for raw in self.raw.get(range).unwrap_or(&[]) {
                if let Some(bytes) = raw.data() {
                    // Bounded by the descriptor's own step capacity.
                    let _ = steps.push(bytes);
                }
            }
            if steps.len() != device.steps.len() {
                continue;
            }
            match sensors::decode(device, &steps) {
                Some(reading) => {
                    // One field per device; capacities match.
                    let _ = back.fields.push(Field {
                        device: index,
                        sweep: seq,
                        reading,
                    });
                }
                None => debug!("device {} did not decode in sweep {}", index, seq),
            }
        }

        self.store.swap();
        self.complete = true;
        self.last_abort = None;
        debug!("sweep {} published", seq);

        // Sweep boundary: nothing is armed until the restart below. In
        // continuous mode this is the only point a due probe can run.
        if self.probe_owed {
            let _ = self.run_probe(bus, now_ms);
        }

        // An empty plan publishes on Start; restarting it would never return.
        if self.config.restart_on_complete && self.plan.step_count() > 0 {
            let _ = self.start_sweep(bus, now_ms);
        }
    }

    fn abort<B: BusPort + ?Sized>(&mut self, bus: &mut B, cause: AbortCause) {
        self.last_abort = Some(cause);
        self.complete = true;
        let code = match cause {
            AbortCause::ArmFailed(e) => ErrorCode::from(e),
            AbortCause::TransferError(code) => code,
            AbortCause::Cancelled => return,
        };
        warn!("sweep {} aborted, error mask {}", self.sweep_seq, code.bits());

        self.health.record_failure(code);
        bus.record_error(code);
        match bus.reset_peripheral() {
            Ok(()) => self.health.note_peripheral_reset(),
            Err(e) => error!("peripheral reset failed: {}", e),
        }
        self.flag_recovery_if_due();
    }

    fn flag_recovery_if_due(&mut self) {
        if self.health.threshold_crossed() && !self.recovery_pending {
            warn!(
                "{} consecutive failures, bus recovery scheduled",
                self.health.stats().consecutive_failures
            );
            self.recovery_pending = true;
        }
    }

    fn cancel(&mut self) {
        let (state, _) = transition(self.state, Event::Cancel, self.plan.step_count());
        if self.state.is_in_flight() {
            self.last_abort = Some(AbortCause::Cancelled);
        }
        self.state = state;
    }

    // ── Health surface ───────────────────────────────────────────────────────

    /// Snapshot of the health counters.
    pub fn health_stats(&self) -> HealthStats {
        self.health.stats()
    }

    /// Health monitor, for classification and the success counter.
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Zero every health counter.
    pub fn reset_health_stats(&mut self) {
        self.health.reset();
        self.recovery_pending = false;
    }

    /// Below the failure threshold and no busy-flag divergence on `bus`.
    pub fn is_healthy<B: BusPort + ?Sized>(&self, bus: &B) -> bool {
        !self.health.threshold_crossed() && !bus.busy_flag_stuck()
    }

    /// Run Bus Recovery now. Any sweep in flight is cancelled first and the
    /// scheduler is left `Idle`.
    ///
    /// # Errors
    ///
    /// As [`BusPort::recover_bus`].
    pub fn recover_bus<B: BusPort + ?Sized>(
        &mut self,
        bus: &mut B,
        now_ms: u64,
    ) -> Result<RecoveryReport, RecoveryError> {
        self.cancel();
        self.recovery_pending = false;
        info!("bus recovery: start");
        let result = bus.recover_bus();
        match result {
            Ok(report) => {
                self.health.on_recovery(now_ms, report.released);
                info!("bus recovery: released after {} pulses", report.pulses);
            }
            Err(RecoveryError::StillHeld) => {
                self.health.on_recovery(now_ms, false);
                warn!("bus recovery: SDA still held low");
            }
            Err(e) => error!("bus recovery failed: {}", e),
        }
        result
    }

    /// Run Forced Reset now. Any sweep in flight is cancelled first and the
    /// scheduler is left `Idle`.
    ///
    /// # Errors
    ///
    /// As [`BusPort::force_reset`].
    pub fn force_reset<B: BusPort + ?Sized>(
        &mut self,
        bus: &mut B,
        now_ms: u64,
    ) -> Result<RecoveryReport, RecoveryError> {
        self.cancel();
        self.recovery_pending = false;
        warn!("forced bus reset");
        let result = bus.force_reset();
        match result {
            Ok(report) => {
                self.health.on_forced_reset(now_ms);
                if !report.released {
                    warn!("forced reset: SDA still held low");
                }
            }
            Err(e) => error!("forced reset failed: {}", e),
        }
        result
    }

    /// Foreground maintenance, called from the main loop.
    ///
    /// In order: pending Bus Recovery (escalating to Forced Reset if SDA stays
    /// held), Forced Reset on busy-flag divergence, then the periodic probe.
    /// A probe that falls due while a sweep is in flight is owed and runs when
    /// that sweep publishes, before any restart.
    pub fn service<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Maintenance {
        if self.recovery_pending {
            return match self.recover_bus(bus, now_ms) {
                Ok(report) => Maintenance::Recovered(report),
                Err(RecoveryError::StillHeld) => self.escalate(bus, now_ms),
                Err(e) => Maintenance::RecoveryFailed(e),
            };
        }
        if bus.busy_flag_stuck() {
            warn!("peripheral busy while idle");
            return self.escalate(bus, now_ms);
        }
        if now_ms >= self.next_probe_at_ms {
            if !self.state.is_in_flight() {
                return self.run_probe(bus, now_ms);
            }
            self.probe_owed = true;
        }
        Maintenance::Idle
    }

    /// `true` when a probe fell due mid-sweep and waits for the sweep boundary.
    pub fn is_probe_owed(&self) -> bool {
        self.probe_owed
    }

    fn run_probe<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Maintenance {
        self.probe_owed = false;
        self.next_probe_at_ms = now_ms.saturating_add(self.config.health.probe_interval_ms);
        self.probe(bus, now_ms)
    }

    fn escalate<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Maintenance {
        match self.force_reset(bus, now_ms) {
            Ok(report) => Maintenance::ForcedReset(report),
            Err(e) => Maintenance::RecoveryFailed(e),
        }
    }

    fn probe<B: BusPort + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Maintenance {
        let mut byte = [0u8; 1];
        match bus.receive(self.config.health.probe_address, &mut byte) {
            Ok(()) => {
                self.health.on_probe_success(now_ms);
                Maintenance::ProbeOk
            }
            Err(e) => {
                warn!("health probe failed: {}", e);
                let code = ErrorCode::from(e);
                self.health.record_failure(code);
                bus.record_error(code);
                self.flag_recovery_if_due();
                Maintenance::ProbeFailed(e)
            }
        }
    }
}

/// [`AcquisitionEngine::service`] with the engine taken out of `shared`.
///
/// The critical section covers only the take and the put-back, so Bus
/// Recovery pulses and Forced Reset holds run with interrupts enabled. The
/// caller must be the only writer of `shared`; a reader meanwhile sees no
/// engine.
///
/// `None` when no engine is installed.
pub fn service_detached<B: BusPort + ?Sized>(
    shared: &SharedEngine,
    bus: &mut B,
    now_ms: u64,
) -> Option<Maintenance> {
    let mut engine = shared.lock(|cell| cell.borrow_mut().take())?;
    let outcome = engine.service(bus, now_ms);
    shared.lock(|cell| *cell.borrow_mut() = Some(engine));
    Some(outcome)
}

fn issue<B: BusPort + ?Sized>(bus: &mut B, step: PlanStep) -> Result<(), BusError> {
    // The mux is reselected before every routed step; its state is not
    // trusted across an interrupt boundary.
    if let Some(route) = step.route {
        router::select_route(bus, route)?;
    }
    bus.start_read(ReadRequest {
        address: step.address,
        register: step.read.register,
        len: step.read.len,
    })
}
