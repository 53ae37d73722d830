//! Builder for constructing state machines.

use super::builtin::BuiltinState;
use super::error::ConfigurationError;
use super::idling::WakeSource;
use super::machine::StateMachine;
use super::settings::EngineSettings;
use crate::core::{ExitStatus, State, StateId};
use crate::registry::{BoxedState, StateRegistry};
use crate::transition::TransitionTable;
use std::sync::Arc;
use tracing::Dispatch;

/// Builder for constructing state machines with a fluent API.
///
/// `Start`, `Stop` and `End` are always present; registering a state with
/// one of their ids fails the build.
pub struct StateMachineBuilder<Ctx: Send + Sync + 'static> {
    name: String,
    states: Vec<BoxedState<Ctx>>,
    transitions: Vec<(StateId, ExitStatus, StateId)>,
    settings: EngineSettings,
    wake_source: Option<Arc<dyn WakeSource>>,
    dispatch: Option<Dispatch>,
}

impl<Ctx: Send + Sync + 'static> StateMachineBuilder<Ctx> {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            settings: EngineSettings::default(),
            wake_source: None,
            dispatch: None,
        }
    }

    /// Add a state.
    pub fn state(mut self, state: impl State<Ctx> + 'static) -> Self {
        self.states.push(Box::new(state));
        self
    }

    /// Add an already boxed state.
    pub fn boxed_state(mut self, state: BoxedState<Ctx>) -> Self {
        self.states.push(state);
        self
    }

    /// Add a transition `from --status--> to`.
    pub fn transition(mut self, from: StateId, status: ExitStatus, to: StateId) -> Self {
        self.transitions.push((from, status, to));
        self
    }

    /// Add multiple transitions at once.
    pub fn transitions(
        mut self,
        transitions: impl IntoIterator<Item = (StateId, ExitStatus, StateId)>,
    ) -> Self {
        self.transitions.extend(transitions);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Settings the machine will be built with.
    pub fn configured_settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Checked by the worker before parking and after waking; see
    /// [`WakeSource`].
    pub fn wake_source(mut self, source: Arc<dyn WakeSource>) -> Self {
        self.wake_source = Some(source);
        self
    }

    /// Send this machine's logs to `dispatch` instead of the global
    /// subscriber.
    pub fn log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Build the machine around `shared`.
    pub fn build(self, shared: Ctx) -> Result<StateMachine<Ctx>, ConfigurationError> {
        self.build_shared(Arc::new(shared))
    }

    /// Build the machine around an already shared context.
    ///
    /// Fails on duplicate states, on transitions that mention unregistered
    /// states, and on conflicting transitions.
    pub fn build_shared(self, shared: Arc<Ctx>) -> Result<StateMachine<Ctx>, ConfigurationError> {
        let mut registry = StateRegistry::new();
        registry.add(Box::new(BuiltinState::start()))?;
        registry.add(Box::new(BuiltinState::stop()))?;
        registry.add(Box::new(BuiltinState::end()))?;
        for state in self.states {
            registry.add(state)?;
        }

        let mut table = TransitionTable::new();
        for (from, status, to) in self.transitions {
            for state in [&from, &to] {
                if !registry.contains(state) {
                    return Err(ConfigurationError::UnknownState {
                        name: state.name().to_string(),
                    });
                }
            }
            table.add(from, status, to)?;
        }

        Ok(StateMachine::from_parts(
            self.name,
            self.settings,
            registry,
            table,
            shared,
            self.wake_source,
            self.dispatch,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StateCore, Timing};
    use crate::engine::{StepContext, WakeReason};
    use crate::transition::TransitionError;

    const READY: StateId = StateId::new("Ready", 20);

    struct Ready {
        core: StateCore,
    }

    impl Ready {
        fn new(id: StateId) -> Self {
            Self {
                core: StateCore::new(id, Timing::Infinite),
            }
        }
    }

    impl State<()> for Ready {
        fn core(&self) -> &StateCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StateCore {
            &mut self.core
        }

        fn process(&mut self, _ctx: &StepContext<'_, ()>, _wake: WakeReason) {}
    }

    #[test]
    fn builder_registers_builtins() {
        let machine = StateMachineBuilder::new("builtins").build(()).unwrap();
        assert_eq!(
            machine.states(),
            vec![StateId::START, StateId::STOP, StateId::END]
        );
        assert_eq!(machine.name(), "builtins");
    }

    #[test]
    fn duplicate_state_fails_build() {
        let result = StateMachineBuilder::new("dup")
            .state(Ready::new(READY))
            .state(Ready::new(READY))
            .build(());
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateState { name }) if name == "Ready"
        ));
    }

    #[test]
    fn builtin_ids_cannot_be_reused() {
        let result = StateMachineBuilder::new("dup")
            .state(Ready::new(StateId::START))
            .build(());
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateState { .. })
        ));
    }

    #[test]
    fn transition_to_unknown_state_fails_build() {
        let result = StateMachineBuilder::new("unknown")
            .transition(StateId::START, ExitStatus::Complete, READY)
            .build(());
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownState { name }) if name == "Ready"
        ));
    }

    #[test]
    fn conflicting_transition_fails_build() {
        let result = StateMachineBuilder::new("conflict")
            .state(Ready::new(READY))
            .transition(StateId::START, ExitStatus::Complete, READY)
            .transition(StateId::START, ExitStatus::Complete, StateId::STOP)
            .build(());
        assert!(matches!(
            result,
            Err(ConfigurationError::ConflictingTransition(
                TransitionError::Conflict { .. }
            ))
        ));
    }

    #[test]
    fn repeated_transition_is_accepted() {
        let machine = StateMachineBuilder::new("repeat")
            .state(Ready::new(READY))
            .transitions([
                (StateId::START, ExitStatus::Complete, READY),
                (StateId::START, ExitStatus::Complete, READY),
            ])
            .build(())
            .unwrap();
        assert_eq!(machine.transitions().len(), 1);
    }

    #[test]
    fn settings_are_applied() {
        let machine = StateMachineBuilder::new("settings")
            .settings(EngineSettings::default().history_depth(4))
            .build(())
            .unwrap();
        assert_eq!(machine.settings().history_depth, 4);
        assert_eq!(machine.state_history().depth(), 4);
    }
}
