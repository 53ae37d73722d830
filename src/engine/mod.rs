//! The threaded state machine engine.
//!
//! One dedicated worker thread per machine runs the loop:
//! - process the current state while it reports `Active`
//! - idle between steps according to its [`Timing`](crate::core::Timing)
//! - on exit, resolve the next state (queued override first, then the
//!   transition table) and enter it
//!
//! Everything else ([`StateMachine::start`], [`StateMachine::stop`],
//! queries) is callable from any thread.

mod builder;
mod builtin;
mod context;
mod error;
mod idling;
mod machine;
mod settings;
mod watchdog;

pub use builder::StateMachineBuilder;
pub use builtin::BuiltinState;
pub use context::StepContext;
pub use error::{ConfigurationError, EngineError};
pub use idling::{WakeReason, WakeSource};
pub use machine::{StateChanged, StateMachine};
pub use settings::EngineSettings;
