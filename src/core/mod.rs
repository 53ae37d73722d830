//! Core state types.
//!
//! This module contains what every machine is made of:
//! - state identity via [`StateId`]
//! - the [`State`] trait with its [`ExitStatus`] and [`Timing`]
//! - bounded history of exited states

mod history;
mod id;
mod state;

pub use history::{HistoryEntry, StateHistory, DEFAULT_HISTORY_DEPTH};
pub use id::StateId;
pub use state::{ExitStatus, State, StateCore, Timing, MIN_PERIOD};
