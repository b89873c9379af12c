//! Sweep state machine.
//!
//! One sweep is `Idle → Step(0) → … → Step(n-1) → Done`. Any error parks the
//! machine in `Aborted`; the next `Start` begins again from step 0. The
//! transition function is pure so every edge can be tested without a bus.
//!
//! ```text
//!  Idle ──Start──▶ Step(0) ──Complete──▶ Step(1) ─ … ─▶ Step(n-1) ──Complete──▶ Done
//!   ▲                 │ TransferError / ArmFailed                                 │
//!   │                 ▼                                                           │
//!   └──Cancel──── Aborted ◀──────────────────────────────────────────────────────┘
//!                    (Start from Done or Aborted restarts at Step(0))
//! ```

use platform::{BusError, ErrorCode};

/// Why a sweep stopped before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortCause {
    /// Arming the next read failed synchronously.
    ArmFailed(BusError),
    /// The error interrupt fired with this mask.
    TransferError(ErrorCode),
    /// Recovery or forced reset pre-empted the sweep.
    Cancelled,
}

/// Position of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SweepState {
    /// Never started, or cancelled.
    #[default]
    Idle,
    /// Read `n` of the flattened plan is in flight.
    Step(usize),
    /// Every read completed; the frame was published.
    Done,
    /// Stopped on an error.
    Aborted(AbortCause),
}

impl SweepState {
    /// `true` while a read is armed.
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Step(_))
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Foreground asked for a new sweep.
    Start,
    /// Transfer-complete interrupt for the current step.
    TransferComplete,
    /// `start_read` returned an error for the step just requested.
    ArmFailed(BusError),
    /// Error interrupt.
    TransferError(ErrorCode),
    /// Recovery is about to take the bus.
    Cancel,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Nothing.
    None,
    /// Arm flattened step `n`.
    Arm(usize),
    /// Decode raw buffers into a frame and publish it.
    Publish,
    /// Refuse the request: a sweep is already in flight.
    Reject,
    /// Record the failure and reset the peripheral.
    Abort(AbortCause),
}

/// Compute the next state for `event` given a plan of `step_count` reads.
pub fn transition(state: SweepState, event: Event, step_count: usize) -> (SweepState, Action) {
    match (state, event) {
        (SweepState::Step(_), Event::Start) => (state, Action::Reject),
        (_, Event::Start) if step_count == 0 => (SweepState::Done, Action::Publish),
        (_, Event::Start) => (SweepState::Step(0), Action::Arm(0)),

        (SweepState::Step(i), Event::TransferComplete) => match i.checked_add(1) {
            Some(next) if next < step_count => (SweepState::Step(next), Action::Arm(next)),
            _ => (SweepState::Done, Action::Publish),
        },
        // Late or duplicate interrupt after an abort/cancel: ignore.
        (_, Event::TransferComplete) => (state, Action::None),

        (SweepState::Step(_), Event::ArmFailed(e)) => {
            let cause = AbortCause::ArmFailed(e);
            (SweepState::Aborted(cause), Action::Abort(cause))
        }
        (_, Event::ArmFailed(_)) => (state, Action::None),

        // An error interrupt counts even when no sweep is running: the
        // peripheral still saw it.
        (_, Event::TransferError(code)) => {
            let cause = AbortCause::TransferError(code);
            (SweepState::Aborted(cause), Action::Abort(cause))
        }

        (_, Event::Cancel) => (SweepState::Idle, Action::None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn run(events: &[Event], n: usize) -> (SweepState, heapless::Vec<Action, 32>) {
        let mut state = SweepState::Idle;
        let mut actions = heapless::Vec::new();
        for ev in events {
            let (s, a) = transition(state, *ev, n);
            state = s;
            actions.push(a).unwrap();
        }
        (state, actions)
    }

    // ── Test A ────────────────────────────────────────────────────────────────
    /// Happy path over three steps arms 0, 1, 2 then publishes.
    #[test]
    fn test_happy_path() {
        let (state, actions) = run(
            &[
                Event::Start,
                Event::TransferComplete,
                Event::TransferComplete,
                Event::TransferComplete,
            ],
            3,
        );
        assert_eq!(state, SweepState::Done);
        assert_eq!(
            actions.as_slice(),
            &[Action::Arm(0), Action::Arm(1), Action::Arm(2), Action::Publish]
        );
    }

    // ── Test B ────────────────────────────────────────────────────────────────
    /// Start while a step is in flight is rejected and does not disturb state.
    #[test]
    fn test_start_while_in_flight_rejected() {
        let (s, a) = transition(SweepState::Step(4), Event::Start, 11);
        assert_eq!(s, SweepState::Step(4));
        assert_eq!(a, Action::Reject);
    }

    // ── Test C ────────────────────────────────────────────────────────────────
    /// Start from Done or Aborted begins again at step 0.
    #[test]
    fn test_restart_from_terminal_states() {
        for state in [
            SweepState::Done,
            SweepState::Aborted(AbortCause::Cancelled),
            SweepState::Aborted(AbortCause::TransferError(ErrorCode::NACK)),
        ] {
            assert_eq!(
                transition(state, Event::Start, 5),
                (SweepState::Step(0), Action::Arm(0))
            );
        }
    }

    // ── Test D ────────────────────────────────────────────────────────────────
    /// Error mid-sweep aborts; a late completion is then ignored.
    #[test]
    fn test_error_aborts_and_late_completion_ignored() {
        let (state, actions) = run(
            &[
                Event::Start,
                Event::TransferComplete,
                Event::TransferError(ErrorCode::NACK),
                Event::TransferComplete,
            ],
            4,
        );
        let cause = AbortCause::TransferError(ErrorCode::NACK);
        assert_eq!(state, SweepState::Aborted(cause));
        assert_eq!(actions[2], Action::Abort(cause));
        assert_eq!(actions[3], Action::None);
    }

    // ── Test E ────────────────────────────────────────────────────────────────
    /// Empty plan: Start publishes immediately.
    #[test]
    fn test_empty_plan_publishes_immediately() {
        assert_eq!(
            transition(SweepState::Idle, Event::Start, 0),
            (SweepState::Done, Action::Publish)
        );
    }

    // ── Test F ────────────────────────────────────────────────────────────────
    /// Cancel returns to Idle from anywhere.
    #[test]
    fn test_cancel_returns_to_idle() {
        for state in [SweepState::Step(2), SweepState::Done, SweepState::Idle] {
            assert_eq!(
                transition(state, Event::Cancel, 3),
                (SweepState::Idle, Action::None)
            );
        }
    }

    // ── Test G ────────────────────────────────────────────────────────────────
    /// Arm failure only matters while stepping.
    #[test]
    fn test_arm_failure() {
        let cause = AbortCause::ArmFailed(BusError::Busy);
        assert_eq!(
            transition(SweepState::Step(0), Event::ArmFailed(BusError::Busy), 3),
            (SweepState::Aborted(cause), Action::Abort(cause))
        );
        assert_eq!(
            transition(SweepState::Idle, Event::ArmFailed(BusError::Busy), 3),
            (SweepState::Idle, Action::None)
        );
    }
}
