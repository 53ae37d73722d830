//! The wait primitive the worker parks on between processing steps.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

/// Why the previous idling wait ended, passed to the next processing step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WakeReason {
    /// No idling happened yet in this state
    #[default]
    NotIdled,
    /// The watchdog period elapsed
    Tick,
    /// A command is waiting
    CommandPending,
    /// Woken by [`resume`](super::StateMachine::resume) or by a stop request
    Interrupted,
    /// The state does not idle
    ContinuousRun,
}

/// Something the worker should not sleep through.
///
/// Checked before parking and again after waking; a pending item makes the
/// wait return [`WakeReason::CommandPending`].
pub trait WakeSource: Send + Sync {
    fn has_pending(&self) -> bool;
}

#[derive(Debug, Default)]
struct WaitState {
    signaled: bool,
    tick: bool,
    waiting: bool,
    cancelled: bool,
}

/// Auto-reset event with a "who woke me" tag.
///
/// A wake-up is consumed by the wait it ends. Ticks are only delivered to
/// a worker that is actually parked; cancellation is sticky until re-armed.
#[derive(Debug, Default)]
pub(crate) struct WaitHandle {
    state: Mutex<WaitState>,
    ready: Condvar,
}

impl WaitHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop stale wake-ups, e.g. when a new state is entered.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        state.signaled = false;
        state.tick = false;
    }

    /// Clear cancellation before the worker is (re)started.
    pub(crate) fn rearm(&self) {
        let mut state = self.state.lock();
        *state = WaitState::default();
    }

    /// Park until woken.
    ///
    /// `pending` is evaluated under the wait lock before parking, so a
    /// command queued right before a [`resume`](Self::resume) is never
    /// slept through.
    pub(crate) fn wait(&self, pending: impl Fn() -> bool) -> WakeReason {
        let mut state = self.state.lock();
        if state.cancelled {
            return WakeReason::Interrupted;
        }
        if pending() {
            return WakeReason::CommandPending;
        }

        state.waiting = true;
        while !state.signaled && !state.cancelled {
            self.ready.wait(&mut state);
        }
        state.waiting = false;
        state.signaled = false;
        let tick = std::mem::take(&mut state.tick);
        drop(state);

        if pending() {
            WakeReason::CommandPending
        } else if tick {
            WakeReason::Tick
        } else {
            WakeReason::Interrupted
        }
    }

    /// Wake the worker.
    ///
    /// If it is not parked the wake-up stays set and ends its next wait
    /// immediately. Returns whether the worker was parked.
    pub(crate) fn resume(&self) -> bool {
        let mut state = self.state.lock();
        state.signaled = true;
        self.ready.notify_one();
        state.waiting
    }

    /// Watchdog wake-up. Returns `false` if nobody was waiting.
    pub(crate) fn tick(&self) -> bool {
        let mut state = self.state.lock();
        if !state.waiting {
            return false;
        }
        state.tick = true;
        state.signaled = true;
        self.ready.notify_one();
        true
    }

    /// Request the worker to stop and wake it if parked.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.signaled = true;
        self.ready.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.state.lock().waiting
    }
}
