//! Bounded record of the states a machine has left.

use super::id::StateId;
use super::state::ExitStatus;
use crate::container::{BoundedStack, Order};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default number of entries kept by a [`StateHistory`].
pub const DEFAULT_HISTORY_DEPTH: usize = 32;

/// One exited state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The state that was left
    pub state: StateId,
    /// Its exit status, i.e. the trigger that was resolved
    pub exit_status: ExitStatus,
    /// When it was left
    pub exited_at: DateTime<Utc>,
}

/// Most recent exited states, newest on top.
///
/// Recording never fails: once the history is full the oldest entry is
/// dropped and counted as lost.
///
/// # Example
///
/// ```rust
/// use devfsm::core::{ExitStatus, StateHistory, StateId};
///
/// let history = StateHistory::new(2);
/// history.record(StateId::START, ExitStatus::Complete);
/// history.record(StateId::new("Homing", 20), ExitStatus::Complete);
/// history.record(StateId::new("Ready", 21), ExitStatus::Error);
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.lost_count(), 1);
/// assert_eq!(history.previous().unwrap().state, StateId::new("Ready", 21));
/// ```
#[derive(Debug)]
pub struct StateHistory {
    entries: BoundedStack<HistoryEntry>,
}

impl StateHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: BoundedStack::named("StateHistory", Order::Lifo, depth),
        }
    }

    /// Push an exited state, evicting the oldest entry if full.
    pub fn record(&self, state: StateId, exit_status: ExitStatus) {
        let entry = HistoryEntry {
            state,
            exit_status,
            exited_at: Utc::now(),
        };
        if let Err(e) = self.entries.push(entry, true) {
            warn!(error = %e, "Failed to record state history");
        }
    }

    /// The most recently exited state.
    pub fn previous(&self) -> Option<HistoryEntry> {
        self.entries.peek()
    }

    /// Copy of all entries.
    pub fn entries(&self, newest_first: bool) -> Vec<HistoryEntry> {
        self.entries.snapshot(newest_first)
    }

    /// Exited states, oldest first.
    pub fn path(&self) -> Vec<StateId> {
        self.entries(false)
            .into_iter()
            .map(|entry| entry.state)
            .collect()
    }

    /// Time between the oldest and the newest recorded exit.
    pub fn duration(&self) -> Option<Duration> {
        let entries = self.entries(false);
        let (first, last) = (entries.first()?, entries.last()?);
        last.exited_at
            .signed_duration_since(first.exited_at)
            .to_std()
            .ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.entries.capacity()
    }

    /// Entries dropped because the history was full.
    pub fn lost_count(&self) -> u64 {
        self.entries.lost_count()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.entries.reset_lost_count();
    }
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}
