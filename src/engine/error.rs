//! Engine errors.

use crate::container::ContainerError;
use crate::transition::TransitionError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Problems detected while assembling a machine.
///
/// Only produced by the builder, never by a running machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("State '{name}' is registered twice")]
    DuplicateState { name: String },

    #[error("State '{name}' is not registered")]
    UnknownState { name: String },

    #[error("Conflicting transition: {0}")]
    ConflictingTransition(#[from] TransitionError),
}

/// Errors reported by a running or starting machine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("Worker thread did not come alive within {waited:?}")]
    StartTimeout { waited: Duration },

    #[error("Worker thread did not finish within {timeout:?}; the machine is unresponsive")]
    Unresponsive { timeout: Duration },

    #[error("State '{name}' is not registered")]
    UnknownState { name: String },

    #[error("State queue rejected the request: {0}")]
    Queue(#[from] ContainerError),
}
