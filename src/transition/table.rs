//! Transition table keyed by (state, exit status).

use super::error::TransitionError;
use crate::core::{ExitStatus, StateId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// The key of a transition: the state being left and its exit status.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionTrigger {
    pub state: StateId,
    pub status: ExitStatus,
}

impl TransitionTrigger {
    pub fn new(state: StateId, status: ExitStatus) -> Self {
        Self { state, status }
    }
}

impl fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{} / {}\"", self.state, self.status)
    }
}

/// Outcome of a successful [`TransitionTable::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// The same transition was already registered; nothing changed.
    AlreadyPresent,
}

/// Maps triggers to next states.
///
/// A trigger leads to at most one state. Registering the same transition
/// twice is harmless; registering a different target for a known trigger is
/// refused and the original mapping is kept.
///
/// ```rust
/// use devfsm::core::{ExitStatus, StateId};
/// use devfsm::transition::{Registration, TransitionTable};
///
/// const READY: StateId = StateId::new("Ready", 20);
///
/// let mut table = TransitionTable::new();
/// assert_eq!(table.add(StateId::START, ExitStatus::Complete, READY), Ok(Registration::Inserted));
/// assert!(table.add(StateId::START, ExitStatus::Complete, StateId::STOP).is_err());
///
/// assert_eq!(table.next_state(&StateId::START, ExitStatus::Complete), Ok(READY));
/// // Active and TimeOut stay put when nothing is registered.
/// assert_eq!(table.next_state(&READY, ExitStatus::TimeOut), Ok(READY));
/// assert!(table.next_state(&READY, ExitStatus::Error).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransitionTable {
    transitions: HashMap<TransitionTrigger, StateId>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state --status--> next`.
    pub fn add(
        &mut self,
        state: StateId,
        status: ExitStatus,
        next: StateId,
    ) -> Result<Registration, TransitionError> {
        self.add_trigger(TransitionTrigger::new(state, status), next)
    }

    pub fn add_trigger(
        &mut self,
        trigger: TransitionTrigger,
        next: StateId,
    ) -> Result<Registration, TransitionError> {
        match self.transitions.get(&trigger) {
            None => {
                self.transitions.insert(trigger, next);
                Ok(Registration::Inserted)
            }
            Some(existing) if *existing == next => Ok(Registration::AlreadyPresent),
            Some(existing) => {
                warn!(
                    trigger = %trigger,
                    existing = %existing,
                    requested = %next,
                    "Conflicting transition ignored"
                );
                Err(TransitionError::Conflict {
                    existing: existing.clone(),
                    trigger,
                    requested: next,
                })
            }
        }
    }

    /// Resolve the state that follows `state` exiting with `status`.
    ///
    /// Without a registered transition, `Active` and `TimeOut` resolve to
    /// `state` itself; every other status is an error.
    pub fn next_state(&self, state: &StateId, status: ExitStatus) -> Result<StateId, TransitionError> {
        let trigger = TransitionTrigger::new(state.clone(), status);
        match self.transitions.get(&trigger) {
            Some(next) => Ok(next.clone()),
            None if status.defaults_to_self() => Ok(state.clone()),
            None => Err(TransitionError::NotDefined {
                state: state.clone(),
                status,
            }),
        }
    }

    pub fn contains(&self, trigger: &TransitionTrigger) -> bool {
        self.transitions.contains_key(trigger)
    }

    /// Registered target of `trigger`, without applying defaults.
    pub fn peek_next(&self, trigger: &TransitionTrigger) -> Option<&StateId> {
        self.transitions.get(trigger)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TransitionTrigger> {
        self.transitions.keys()
    }

    /// Registered transitions as `(trigger, next)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&TransitionTrigger, &StateId)> {
        self.transitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StateId = StateId::new("A", 20);
    const B: StateId = StateId::new("B", 21);

    #[test]
    fn add_inserts_new_transition() {
        let mut table = TransitionTable::new();
        assert_eq!(table.add(A, ExitStatus::Complete, B), Ok(Registration::Inserted));
        assert_eq!(table.len(), 1);
        assert!(table.contains(&TransitionTrigger::new(A, ExitStatus::Complete)));
    }

    #[test]
    fn same_transition_twice_is_idempotent() {
        let mut table = TransitionTable::new();
        table.add(A, ExitStatus::Complete, B).unwrap();

        assert_eq!(
            table.add(A, ExitStatus::Complete, B),
            Ok(Registration::AlreadyPresent)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn conflicting_transition_keeps_original() {
        let mut table = TransitionTable::new();
        table.add(A, ExitStatus::Complete, B).unwrap();

        let result = table.add(A, ExitStatus::Complete, StateId::STOP);

        assert_eq!(
            result,
            Err(TransitionError::Conflict {
                trigger: TransitionTrigger::new(A, ExitStatus::Complete),
                existing: B,
                requested: StateId::STOP,
            })
        );
        assert_eq!(table.next_state(&A, ExitStatus::Complete), Ok(B));
    }

    #[test]
    fn triggers_differ_by_status() {
        let mut table = TransitionTable::new();
        table.add(A, ExitStatus::Complete, B).unwrap();
        table.add(A, ExitStatus::Error, StateId::STOP).unwrap();

        assert_eq!(table.next_state(&A, ExitStatus::Complete), Ok(B));
        assert_eq!(table.next_state(&A, ExitStatus::Error), Ok(StateId::STOP));
    }

    #[test]
    fn active_and_timeout_default_to_self() {
        let table = TransitionTable::new();
        assert_eq!(table.next_state(&A, ExitStatus::Active), Ok(A));
        assert_eq!(table.next_state(&A, ExitStatus::TimeOut), Ok(A));
    }

    #[test]
    fn registered_timeout_overrides_default() {
        let mut table = TransitionTable::new();
        table.add(A, ExitStatus::TimeOut, B).unwrap();
        assert_eq!(table.next_state(&A, ExitStatus::TimeOut), Ok(B));
    }

    #[test]
    fn other_statuses_without_transition_are_errors() {
        let table = TransitionTable::new();
        for status in [ExitStatus::NA, ExitStatus::Complete, ExitStatus::Error] {
            assert_eq!(
                table.next_state(&A, status),
                Err(TransitionError::NotDefined { state: A, status })
            );
        }
    }

    #[test]
    fn lookup_ignores_name_case() {
        let mut table = TransitionTable::new();
        table.add(StateId::owned("ready", 30), ExitStatus::Complete, B).unwrap();
        assert_eq!(
            table.next_state(&StateId::new("READY", 30), ExitStatus::Complete),
            Ok(B)
        );
    }

    #[test]
    fn peek_next_does_not_apply_defaults() {
        let mut table = TransitionTable::new();
        table.add(A, ExitStatus::Complete, B).unwrap();
        assert_eq!(
            table.peek_next(&TransitionTrigger::new(A, ExitStatus::Complete)),
            Some(&B)
        );
        assert_eq!(
            table.peek_next(&TransitionTrigger::new(A, ExitStatus::Active)),
            None
        );
        assert_eq!(table.triggers().count(), 1);
        assert_eq!(table.iter().count(), 1);
    }
}
