//! Command queue error types.

use crate::container::ContainerError;
use thiserror::Error;

/// Errors reported when submitting commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Command queue is at capacity {capacity}")]
    AtCapacity { capacity: usize },

    #[error(transparent)]
    Container(#[from] ContainerError),
}
