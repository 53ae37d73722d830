//! State transitions.
//!
//! A transition is keyed by a [`TransitionTrigger`], the pair of the state
//! being left and its [`ExitStatus`](crate::core::ExitStatus).

mod error;
mod table;

pub use error::TransitionError;
pub use table::{Registration, TransitionTable, TransitionTrigger};
