//! Container error types.

use thiserror::Error;

/// Errors reported by [`BoundedContainer`](super::BoundedContainer) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("Container '{name}' is at capacity {capacity}")]
    AtCapacity { name: String, capacity: usize },

    #[error("Container '{name}' cannot make room for {requested} items (capacity {capacity})")]
    InsufficientRoom {
        name: String,
        requested: usize,
        capacity: usize,
    },

    #[error("Container '{name}' has been disposed")]
    Disposed { name: String },
}
