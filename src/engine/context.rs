//! What a state sees while it runs.

use super::error::EngineError;
use super::machine::EngineCore;
use crate::core::StateId;
use crate::registry::StateRegistry;
use uuid::Uuid;

/// Handed to every state hook.
///
/// Gives access to the shared context of the machine and lets a state
/// steer the engine by queueing override states.
pub struct StepContext<'a, Ctx> {
    pub(crate) shared: &'a Ctx,
    pub(crate) core: &'a EngineCore,
    pub(crate) registry: &'a StateRegistry<Ctx>,
    pub(crate) state: &'a StateId,
}

impl<'a, Ctx> StepContext<'a, Ctx> {
    /// The context object the machine was built with.
    pub fn shared(&self) -> &'a Ctx {
        self.shared
    }

    pub fn machine_name(&self) -> &'a str {
        self.core.name()
    }

    pub fn instance_id(&self) -> Uuid {
        self.core.instance_id()
    }

    /// The state whose hook is running.
    pub fn current_state(&self) -> &'a StateId {
        self.state
    }

    /// The most recently exited state.
    pub fn previous_state(&self) -> Option<StateId> {
        self.core.previous_state()
    }

    /// Make `state` the next state, ahead of the transition table.
    ///
    /// Queued states are taken in order, one per transition.
    pub fn queue_state(&self, state: StateId) -> Result<(), EngineError> {
        self.core.queue_state(self.registry, state)
    }

    /// Whether queued override states remain.
    pub fn in_state_sequence(&self) -> bool {
        self.core.in_state_sequence()
    }

    /// A stop was requested. States with long-running steps should wind
    /// down when they see this.
    pub fn cancellation_requested(&self) -> bool {
        self.core.cancellation_requested()
    }
}
