//! Monotonic millisecond tick source
//!
//! The health probe interval, the last-success timestamp and the recovery
//! timing all run off a single monotonic millisecond counter. On hardware
//! this is embassy-time's tick (TIM2 time driver); tests use
//! [`crate::mocks::ManualClock`].

/// Monotonic millisecond counter.
pub trait Clock {
    /// Milliseconds since boot. Never decreases.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by `embassy_time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

/// Milliseconds elapsed from `since` to `now`, zero if the clock appears to
/// have gone backwards.
#[inline]
pub fn elapsed_ms(now: u64, since: u64) -> u64 {
    now.saturating_sub(since)
}
