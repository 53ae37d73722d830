//! Binding errors.

use crate::command::QueueError;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by [`CommandDrivenBinding`](super::CommandDrivenBinding).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("Configuration cannot be changed in state '{state}'")]
    IncompatibleState { state: String },

    #[error("Configuration lock not acquired within {timeout:?}")]
    ConfigurationLocked { timeout: Duration },

    #[error(transparent)]
    Queue(#[from] QueueError),
}
