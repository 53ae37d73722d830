//! Transition errors.

use super::table::TransitionTrigger;
use crate::core::{ExitStatus, StateId};
use thiserror::Error;

/// Errors raised when registering or resolving transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No transition defined from '{state}' on {status}")]
    NotDefined { state: StateId, status: ExitStatus },

    #[error("Trigger {trigger} already leads to '{existing}', cannot add '{requested}'")]
    Conflict {
        trigger: TransitionTrigger,
        existing: StateId,
        requested: StateId,
    },

    #[error("State '{name}' is not registered")]
    UnknownState { name: String },

    #[error("Transitions cannot be changed while the engine is running")]
    EngineRunning,
}
