//! Bounded concurrent containers.
//!
//! These back the command queue, the override-state queue and the state
//! history of every machine:
//! - [`BoundedContainer`] with [`Order::Fifo`] or [`Order::Lifo`] pop order
//! - forced insertion that evicts the oldest entries and counts them as lost
//! - a short error history instead of panics on failure paths

mod bounded;
mod error;

pub use bounded::{
    BoundedContainer, BoundedQueue, BoundedStack, Order, DEFAULT_CAPACITY, ERROR_HISTORY_DEPTH,
};
pub use error::ContainerError;
