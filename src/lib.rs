//! Devfsm: a threaded state machine runtime for device control loops
//!
//! Every [`StateMachine`] runs its states on a dedicated worker thread.
//! A state processes in steps; between steps the worker either keeps
//! going, parks until something happens, or parks until a watchdog tick.
//! When a state stops being active its exit status is looked up in the
//! [`TransitionTable`] to find the next state.
//!
//! # Core Concepts
//!
//! - **State**: user code implementing [`State`], identified by a [`StateId`]
//! - **Transitions**: `(state, exit status) -> next state`, with a
//!   self-transition default for `Active` and `TimeOut`
//! - **Commands**: status-tracked requests queued for the worker, with
//!   optional pending and processing timeouts
//! - **Bindings**: [`CommandDrivenBinding`] couples a machine with a
//!   configuration, a hardware driver and a command channel
//!
//! # Example
//!
//! ```rust
//! use devfsm::core::{ExitStatus, State, StateCore, StateId, Timing};
//! use devfsm::engine::{StateMachine, StepContext, WakeReason};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! const COUNT: StateId = StateId::new("Count", 20);
//!
//! struct Count {
//!     core: StateCore,
//! }
//!
//! impl State<AtomicU32> for Count {
//!     fn core(&self) -> &StateCore { &self.core }
//!     fn core_mut(&mut self) -> &mut StateCore { &mut self.core }
//!
//!     fn process(&mut self, ctx: &StepContext<'_, AtomicU32>, _wake: WakeReason) {
//!         if ctx.shared().fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
//!             self.set_status(ExitStatus::Complete);
//!         }
//!     }
//! }
//!
//! let machine = StateMachine::builder("counter")
//!     .state(Count { core: StateCore::new(COUNT, Timing::Continuous) })
//!     .transition(StateId::START, ExitStatus::Complete, COUNT)
//!     .transition(COUNT, ExitStatus::Complete, StateId::STOP)
//!     .build(AtomicU32::new(0))
//!     .unwrap();
//!
//! machine.start().unwrap();
//! while machine.is_running() {
//!     std::thread::sleep(std::time::Duration::from_millis(1));
//! }
//! assert_eq!(machine.current_state(), StateId::STOP);
//! assert_eq!(machine.shared().load(Ordering::SeqCst), 3);
//! ```

pub mod binding;
pub mod command;
pub mod container;
pub mod core;
pub mod engine;
mod macros;
pub mod notify;
pub mod registry;
pub mod transition;

// Re-export commonly used types
pub use binding::{CommandDrivenBinding, DeviceContext, HardwareDriver};
pub use command::{Command, CommandStatus};
pub use self::core::{ExitStatus, State, StateCore, StateId, Timing};
pub use engine::{EngineSettings, StateMachine, StateMachineBuilder, StepContext, WakeReason};
pub use transition::TransitionTable;
