//! The `State` trait and the values every state carries.

use super::id::StateId;
use crate::command::CommandStatus;
use crate::engine::{StepContext, WakeReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Shortest watchdog period a periodic state may declare.
pub const MIN_PERIOD: Duration = Duration::from_millis(15);

/// Outcome a state reports from its processing step.
///
/// The engine keeps calling [`State::process`] while the status is
/// `Active`; any other value ends the state and becomes the second half of
/// the transition trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitStatus {
    #[default]
    NA,
    Active,
    Complete,
    Error,
    TimeOut,
}

impl ExitStatus {
    pub const ALL: [ExitStatus; 5] = [
        Self::NA,
        Self::Active,
        Self::Complete,
        Self::Error,
        Self::TimeOut,
    ];

    /// Statuses that fall back to a self-transition when no transition is
    /// registered for them.
    pub fn defaults_to_self(self) -> bool {
        matches!(self, Self::Active | Self::TimeOut)
    }

    /// Exit status corresponding to the outcome of a command.
    ///
    /// ```rust
    /// use devfsm::command::CommandStatus;
    /// use devfsm::core::ExitStatus;
    ///
    /// assert_eq!(ExitStatus::from_command_status(CommandStatus::SUCCESS), ExitStatus::Complete);
    /// assert_eq!(ExitStatus::from_command_status(CommandStatus::TIMEOUT), ExitStatus::Error);
    /// assert_eq!(ExitStatus::from_command_status(CommandStatus::PROCESSING), ExitStatus::Active);
    /// ```
    pub fn from_command_status(status: CommandStatus) -> Self {
        if status.is_error() {
            Self::Error
        } else if status.is_processed() {
            Self::Complete
        } else if status.is_active() {
            Self::Active
        } else {
            Self::NA
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NA => "NA",
            Self::Active => "Active",
            Self::Complete => "Complete",
            Self::Error => "Error",
            Self::TimeOut => "TimeOut",
        };
        f.write_str(name)
    }
}

/// How the engine idles between processing steps of a state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// Park until a command arrives or the machine is resumed.
    #[default]
    Infinite,
    /// Never idle; call the processing step back to back.
    Continuous,
    /// Park until the watchdog ticks, a command arrives or the machine is
    /// resumed.
    Periodic(Duration),
}

impl Timing {
    /// Periodic timing, clamped to [`MIN_PERIOD`].
    pub fn periodic(period: Duration) -> Self {
        Self::Periodic(period.max(MIN_PERIOD))
    }

    /// Negative means infinite, zero means continuous.
    ///
    /// ```rust
    /// use devfsm::core::Timing;
    /// use std::time::Duration;
    ///
    /// assert_eq!(Timing::from_millis(-1), Timing::Infinite);
    /// assert_eq!(Timing::from_millis(0), Timing::Continuous);
    /// assert_eq!(Timing::from_millis(5), Timing::Periodic(Duration::from_millis(15)));
    /// ```
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Self::Infinite,
            0 => Self::Continuous,
            ms => Self::periodic(Duration::from_millis(ms as u64)),
        }
    }

    /// Watchdog period, if any.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Periodic(period) => Some((*period).max(MIN_PERIOD)),
            _ => None,
        }
    }

    pub fn uses_watchdog(&self) -> bool {
        matches!(self, Self::Periodic(_))
    }

    pub fn uses_idling(&self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

/// Bookkeeping shared by every state implementation.
#[derive(Clone, Debug)]
pub struct StateCore {
    id: StateId,
    status: ExitStatus,
    timing: Timing,
}

impl StateCore {
    pub fn new(id: StateId, timing: Timing) -> Self {
        Self {
            id,
            status: ExitStatus::NA,
            timing,
        }
    }

    pub fn id(&self) -> &StateId {
        &self.id
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ExitStatus) {
        self.status = status;
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }
}

/// A state of a machine over the shared context `Ctx`.
///
/// Each machine owns its states exclusively. The engine calls the hooks
/// from its worker thread only, in the order `enter`, `process` (repeated
/// while the status is `Active`), `exit`.
///
/// # Example
///
/// ```rust
/// use devfsm::core::{ExitStatus, State, StateCore, StateId, Timing};
/// use devfsm::engine::{StepContext, WakeReason};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// struct Poll {
///     core: StateCore,
/// }
///
/// impl State<AtomicU32> for Poll {
///     fn core(&self) -> &StateCore { &self.core }
///     fn core_mut(&mut self) -> &mut StateCore { &mut self.core }
///
///     fn process(&mut self, ctx: &StepContext<'_, AtomicU32>, wake: WakeReason) {
///         if wake == WakeReason::Tick && ctx.shared().fetch_add(1, Ordering::SeqCst) >= 3 {
///             self.set_status(ExitStatus::Complete);
///         }
///     }
/// }
///
/// let poll = Poll {
///     core: StateCore::new(StateId::new("Poll", 20), Timing::periodic(Duration::from_millis(50))),
/// };
/// assert!(poll.timing().uses_watchdog());
/// assert_eq!(poll.status(), ExitStatus::NA);
/// ```
pub trait State<Ctx>: Send {
    fn core(&self) -> &StateCore;

    fn core_mut(&mut self) -> &mut StateCore;

    /// Called once when the state becomes current, after it was activated.
    fn enter(&mut self, _ctx: &StepContext<'_, Ctx>) {}

    /// One processing step. `wake` tells why the previous idling ended.
    ///
    /// Must not block for long: the whole machine waits for it.
    fn process(&mut self, ctx: &StepContext<'_, Ctx>, wake: WakeReason);

    /// Called once when the state stops being current.
    fn exit(&mut self, _ctx: &StepContext<'_, Ctx>) {}

    fn id(&self) -> &StateId {
        self.core().id()
    }

    fn timing(&self) -> Timing {
        self.core().timing()
    }

    fn status(&self) -> ExitStatus {
        self.core().status()
    }

    fn set_status(&mut self, status: ExitStatus) {
        self.core_mut().set_status(status);
    }

    fn is_active(&self) -> bool {
        self.status() == ExitStatus::Active
    }

    /// Reset the status to `Active` before entering.
    fn activate(&mut self) {
        self.set_status(ExitStatus::Active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_clamps_short_periods() {
        assert_eq!(
            Timing::periodic(Duration::from_millis(1)),
            Timing::Periodic(MIN_PERIOD)
        );
        assert_eq!(
            Timing::Periodic(Duration::from_millis(2)).period(),
            Some(MIN_PERIOD)
        );
        assert_eq!(Timing::Infinite.period(), None);
    }

    #[test]
    fn timing_idling_flags() {
        assert!(Timing::Infinite.uses_idling());
        assert!(!Timing::Infinite.uses_watchdog());
        assert!(!Timing::Continuous.uses_idling());
        assert!(!Timing::Continuous.uses_watchdog());
        let periodic = Timing::from_millis(100);
        assert!(periodic.uses_idling());
        assert!(periodic.uses_watchdog());
    }

    #[test]
    fn only_active_and_timeout_default_to_self() {
        let defaults: Vec<_> = ExitStatus::ALL
            .into_iter()
            .filter(|status| status.defaults_to_self())
            .collect();
        assert_eq!(defaults, vec![ExitStatus::Active, ExitStatus::TimeOut]);
    }

    #[test]
    fn command_outcomes_map_to_exit_status() {
        for status in [
            CommandStatus::SUCCESS,
            CommandStatus::IGNORED,
            CommandStatus::REJECTED,
        ] {
            assert_eq!(ExitStatus::from_command_status(status), ExitStatus::Complete);
        }
        for status in [
            CommandStatus::FAILED,
            CommandStatus::TIMEOUT,
            CommandStatus::WRONG,
        ] {
            assert_eq!(ExitStatus::from_command_status(status), ExitStatus::Error);
        }
        assert_eq!(
            ExitStatus::from_command_status(CommandStatus::CREATED),
            ExitStatus::NA
        );
    }

    #[test]
    fn state_core_tracks_status() {
        let mut core = StateCore::new(StateId::new("Ready", 20), Timing::Continuous);
        assert_eq!(core.status(), ExitStatus::NA);
        core.set_status(ExitStatus::Error);
        assert_eq!(core.status(), ExitStatus::Error);
        core.set_timing(Timing::Infinite);
        assert_eq!(core.timing(), Timing::Infinite);
    }

    #[test]
    fn exit_status_serializes_correctly() {
        let json = serde_json::to_string(&ExitStatus::TimeOut).unwrap();
        let deserialized: ExitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ExitStatus::TimeOut);
        assert_eq!(ExitStatus::TimeOut.to_string(), "TimeOut");
    }
}
