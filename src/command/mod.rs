//! Command lifecycle and queueing.
//!
//! A [`Command`] moves `CREATED → PENDING → PROCESSING → <terminal>`, where
//! the terminal outcome is any bit of [`CommandStatus::PROCESSING_COMPLETE`].
//! `TIMEOUT` is sticky: once set, nothing else is applied.

#[allow(clippy::module_inception)]
mod command;
mod channel;
mod error;
mod queue;
mod status;
mod timer;

pub use channel::CommandChannel;
pub use command::{
    timeout_from_millis, Arguments, Command, CommandBuilder, CommandEvent, CommandKind,
    StatusCallback, MIN_TIMEOUT,
};
pub use error::QueueError;
pub use queue::{CommandAdded, CommandQueue, DEFAULT_COMMAND_QUEUE_DEPTH};
pub use status::CommandStatus;
