//! State shared between the run loop and [`CheckerHandle`](crate::CheckerHandle)s.
//!
//! The run loop is the only writer of phase and match state. Handles may
//! observe the phase and push the deadline forward; both go through
//! synchronized cells so a reader never sees a torn transition.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Stand-in for limits too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Lifecycle of a checker.
///
/// `Configured -> Listening -> {Succeeded, TimedOut, EventLimitExceeded, Failed}`.
/// The four terminal phases are final; a finished checker cannot be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerPhase {
    Configured,
    Listening,
    Succeeded,
    TimedOut,
    EventLimitExceeded,
    Failed,
}

impl CheckerPhase {
    /// Whether the run loop has begun consuming events (possibly already finished).
    #[must_use]
    pub fn has_started(self) -> bool {
        !matches!(self, Self::Configured)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Configured | Self::Listening)
    }
}

#[derive(Debug, Clone, Copy)]
enum DeadlineState {
    /// Run loop not started yet.
    Unarmed,
    Armed(Instant),
    /// Run loop finished; resets are ignored.
    Disarmed,
}

/// Wall-clock budget of one run, refreshable from other tasks.
#[derive(Debug)]
pub(crate) struct DeadlineControl {
    time_limit: Duration,
    state: Mutex<DeadlineState>,
    changed: Notify,
}

impl DeadlineControl {
    pub(crate) fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            state: Mutex::new(DeadlineState::Unarmed),
            changed: Notify::new(),
        }
    }

    pub(crate) fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Start the clock. Returns the initial deadline.
    pub(crate) fn arm(&self) -> Instant {
        let deadline = self.deadline_from_now();
        *self.lock() = DeadlineState::Armed(deadline);
        deadline
    }

    pub(crate) fn disarm(&self) {
        *self.lock() = DeadlineState::Disarmed;
    }

    /// Push the deadline to `now + time_limit`.
    ///
    /// Returns the new deadline, or `None` when the run is not listening
    /// (not started or already terminal), in which case nothing changes.
    pub(crate) fn reset(&self) -> Option<Instant> {
        let mut state = self.lock();
        match *state {
            DeadlineState::Armed(_) => {
                let deadline = self.deadline_from_now();
                *state = DeadlineState::Armed(deadline);
                drop(state);
                self.changed.notify_one();
                Some(deadline)
            }
            DeadlineState::Unarmed | DeadlineState::Disarmed => None,
        }
    }

    pub(crate) fn current(&self) -> Option<Instant> {
        match *self.lock() {
            DeadlineState::Armed(deadline) => Some(deadline),
            DeadlineState::Unarmed | DeadlineState::Disarmed => None,
        }
    }

    /// Resolves after the next successful [`reset`](Self::reset).
    ///
    /// A reset that lands while nobody is waiting is remembered and wakes
    /// the next waiter immediately.
    pub(crate) async fn changed(&self) {
        self.changed.notified().await;
    }

    fn deadline_from_now(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.time_limit).unwrap_or_else(|| now + FAR_FUTURE)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeadlineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
