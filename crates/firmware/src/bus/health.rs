//! Bus Health Monitor.
//!
//! Accounting only: this module decides *when* escalation is due, never
//! touches the bus. The engine feeds it every success and failure and asks
//! [`HealthMonitor::threshold_crossed`] after each failure.
//!
//! # Decay policy
//!
//! Every failure bumps the consecutive-failure counter. Successes accumulate
//! only while that counter is non-zero; once more than
//! `success_decay_threshold` of them have accumulated, the counter drops by
//! one and the success count restarts. Sporadic NACKs therefore never reach
//! the recovery threshold, while a bus that fails more often than it
//! succeeds still does.

use platform::{ErrorCode, HealthPolicy};

use crate::error::FaultClass;

/// Snapshot of the Health Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthStats {
    /// Every failed operation.
    pub errors: u32,
    /// Failures with the TIMEOUT bit.
    pub timeouts: u32,
    /// Failures with the BERR bit.
    pub bus_errors: u32,
    /// Failures with the ARLO bit.
    pub arbitration_losses: u32,
    /// Failures with the AF (NACK) bit.
    pub nacks: u32,
    /// Bus Recoveries and Forced Resets performed.
    pub recoveries: u32,
    /// Lightweight per-transaction peripheral resets.
    pub peripheral_resets: u32,
    /// Current consecutive-failure count.
    pub consecutive_failures: u32,
    /// Tick of the last successful transaction, 0 if none yet.
    pub last_success_ms: u64,
}

/// Coarse bus condition derived from the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusCondition {
    /// No outstanding failures.
    Healthy,
    /// Failures outstanding, below the recovery threshold.
    Degraded {
        /// Outstanding consecutive failures.
        consecutive_failures: u32,
    },
    /// Threshold reached; Bus Recovery is due.
    Failed,
}

/// Health Record plus the policy that interprets it.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    policy: HealthPolicy,
    stats: HealthStats,
    success_count: u32,
}

impl HealthMonitor {
    /// Fresh record under `policy`.
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            stats: HealthStats::default(),
            success_count: 0,
        }
    }

    /// Active policy.
    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Counter snapshot.
    pub fn stats(&self) -> HealthStats {
        self.stats
    }

    /// Successes accumulated toward the next decay step.
    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Account one failed operation. `code` may carry several bits; each
    /// kind it names is counted.
    pub fn record_failure(&mut self, code: ErrorCode) {
        let s = &mut self.stats;
        s.errors = s.errors.saturating_add(1);
        s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        if code.contains(ErrorCode::TIMEOUT) {
            s.timeouts = s.timeouts.saturating_add(1);
        }
        if code.contains(ErrorCode::BUS_ERROR) {
            s.bus_errors = s.bus_errors.saturating_add(1);
        }
        if code.contains(ErrorCode::ARBITRATION_LOST) {
            s.arbitration_losses = s.arbitration_losses.saturating_add(1);
        }
        if code.contains(ErrorCode::NACK) {
            s.nacks = s.nacks.saturating_add(1);
        }
    }

    /// Account one successful operation at `now_ms`.
    pub fn record_success(&mut self, now_ms: u64) {
        self.stats.last_success_ms = now_ms;
        if self.stats.consecutive_failures == 0 {
            self.success_count = 0;
            return;
        }
        self.success_count = self.success_count.saturating_add(1);
        if self.success_count > self.policy.success_decay_threshold {
            self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_sub(1);
            self.success_count = 0;
        }
    }

    /// `true` once consecutive failures reach the recovery threshold.
    pub fn threshold_crossed(&self) -> bool {
        self.stats.consecutive_failures >= self.policy.failure_threshold
    }

    /// Liveness probe answered: the bus is demonstrably alive.
    pub fn on_probe_success(&mut self, now_ms: u64) {
        self.clear_failures(now_ms);
    }

    /// Bus Recovery ran. Counted whether or not the data line came free;
    /// only a released bus clears the failure state.
    pub fn on_recovery(&mut self, now_ms: u64, released: bool) {
        self.stats.recoveries = self.stats.recoveries.saturating_add(1);
        if released {
            self.clear_failures(now_ms);
        }
    }

    /// Forced Reset ran.
    pub fn on_forced_reset(&mut self, now_ms: u64) {
        self.stats.recoveries = self.stats.recoveries.saturating_add(1);
        self.clear_failures(now_ms);
    }

    /// Lightweight per-transaction reset performed.
    pub fn note_peripheral_reset(&mut self) {
        self.stats.peripheral_resets = self.stats.peripheral_resets.saturating_add(1);
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        self.stats = HealthStats::default();
        self.success_count = 0;
    }

    /// Condition implied by the counters alone.
    pub fn condition(&self) -> BusCondition {
        match self.stats.consecutive_failures {
            0 => BusCondition::Healthy,
            _ if self.threshold_crossed() => BusCondition::Failed,
            n => BusCondition::Degraded {
                consecutive_failures: n,
            },
        }
    }

    /// Fault class currently in effect; `stuck` is the busy-flag divergence.
    pub fn classify(&self, stuck: bool) -> Option<FaultClass> {
        if stuck {
            return Some(FaultClass::StuckBus);
        }
        match self.condition() {
            BusCondition::Healthy => None,
            BusCondition::Degraded { .. } => Some(FaultClass::TransientBusFault),
            BusCondition::Failed => Some(FaultClass::PersistentBusFault),
        }
    }

    fn clear_failures(&mut self, now_ms: u64) {
        self.stats.consecutive_failures = 0;
        self.success_count = 0;
        self.stats.last_success_ms = now_ms;
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ── Test A ────────────────────────────────────────────────────────────────
    /// 5 failures then 11 successes: exactly one decrement, success count 0.
    #[test]
    fn test_decay_after_eleven_successes() {
        let mut h = HealthMonitor::default();
        for _ in 0..5 {
            h.record_failure(ErrorCode::NACK);
        }
        for t in 0..10 {
            h.record_success(t);
        }
        assert_eq!(h.stats().consecutive_failures, 5);
        assert_eq!(h.success_count(), 10);

        h.record_success(10);
        assert_eq!(h.stats().consecutive_failures, 4);
        assert_eq!(h.success_count(), 0);
    }

    // ── Test B ────────────────────────────────────────────────────────────────
    /// Successes on a healthy bus do not bank credit against later failures.
    #[test]
    fn test_no_credit_while_healthy() {
        let mut h = HealthMonitor::default();
        for t in 0..100 {
            h.record_success(t);
        }
        assert_eq!(h.success_count(), 0);
        h.record_failure(ErrorCode::NACK);
        h.record_success(200);
        assert_eq!(h.stats().consecutive_failures, 1);
        assert_eq!(h.success_count(), 1);
    }

    // ── Test C ────────────────────────────────────────────────────────────────
    /// Threshold is reached at exactly 50 consecutive failures.
    #[test]
    fn test_threshold_at_fifty() {
        let mut h = HealthMonitor::default();
        for _ in 0..49 {
            h.record_failure(ErrorCode::TIMEOUT);
        }
        assert!(!h.threshold_crossed());
        assert_eq!(
            h.condition(),
            BusCondition::Degraded {
                consecutive_failures: 49
            }
        );
        h.record_failure(ErrorCode::TIMEOUT);
        assert!(h.threshold_crossed());
        assert_eq!(h.condition(), BusCondition::Failed);
        assert_eq!(h.stats().timeouts, 50);
    }

    // ── Test D ────────────────────────────────────────────────────────────────
    /// A multi-bit mask counts under every kind it names, but is one error.
    #[test]
    fn test_multi_bit_mask_counts_each_kind() {
        let mut h = HealthMonitor::default();
        h.record_failure(ErrorCode::BUS_ERROR | ErrorCode::ARBITRATION_LOST);
        let s = h.stats();
        assert_eq!(s.errors, 1);
        assert_eq!(s.bus_errors, 1);
        assert_eq!(s.arbitration_losses, 1);
        assert_eq!(s.timeouts, 0);
        assert_eq!(s.consecutive_failures, 1);
    }

    // ── Test E ────────────────────────────────────────────────────────────────
    /// Recovery that leaves SDA held counts but keeps the failure state.
    #[test]
    fn test_unreleased_recovery_keeps_failures() {
        let mut h = HealthMonitor::default();
        for _ in 0..50 {
            h.record_failure(ErrorCode::TIMEOUT);
        }
        h.on_recovery(1_000, false);
        assert_eq!(h.stats().recoveries, 1);
        assert!(h.threshold_crossed());

        h.on_recovery(2_000, true);
        assert_eq!(h.stats().recoveries, 2);
        assert_eq!(h.stats().consecutive_failures, 0);
        assert_eq!(h.stats().last_success_ms, 2_000);
        // Cumulative counters survive recovery.
        assert_eq!(h.stats().errors, 50);
    }

    // ── Test F ────────────────────────────────────────────────────────────────
    /// Classification follows the escalation ladder.
    #[test]
    fn test_classify() {
        let mut h = HealthMonitor::default();
        assert_eq!(h.classify(false), None);
        assert_eq!(h.classify(true), Some(FaultClass::StuckBus));
        h.record_failure(ErrorCode::NACK);
        assert_eq!(h.classify(false), Some(FaultClass::TransientBusFault));
        for _ in 0..49 {
            h.record_failure(ErrorCode::NACK);
        }
        assert_eq!(h.classify(false), Some(FaultClass::PersistentBusFault));
        h.reset();
        assert_eq!(h.stats(), HealthStats::default());
    }

    proptest! {
        /// The decay never removes more than one failure per
        /// `decay + 1` successes, and never underflows.
        #[test]
        fn decay_is_bounded(failures in 0u32..200, successes in 0u32..2_000) {
            let mut h = HealthMonitor::default();
            for _ in 0..failures {
                h.record_failure(ErrorCode::NACK);
            }
            for t in 0..successes {
                h.record_success(u64::from(t));
            }
            let decay = h.policy().success_decay_threshold + 1;
            let removed = failures - h.stats().consecutive_failures;
            prop_assert_eq!(removed, (successes / decay).min(failures));
            prop_assert!(h.success_count() <= h.policy().success_decay_threshold);
        }

        /// Any custom threshold is honoured exactly.
        #[test]
        fn custom_threshold(threshold in 1u32..500) {
            let policy = HealthPolicy { failure_threshold: threshold, ..HealthPolicy::default() };
            let mut h = HealthMonitor::new(policy);
            for _ in 0..threshold - 1 {
                h.record_failure(ErrorCode::NACK);
            }
            prop_assert!(!h.threshold_crossed());
            h.record_failure(ErrorCode::NACK);
            prop_assert!(h.threshold_crossed());
        }
    }
}
