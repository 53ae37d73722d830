//! Per-machine set of states.

use crate::core::{State, StateId};
use crate::engine::ConfigurationError;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;

/// Boxed state as stored in a [`StateRegistry`].
pub type BoxedState<Ctx> = Box<dyn State<Ctx>>;

/// The states of one machine, keyed by [`StateId`].
///
/// Filled while the machine is built and read-only afterwards. Each state
/// sits behind its own lock so status queries never wait on the worker for
/// longer than one hook call.
pub struct StateRegistry<Ctx> {
    states: HashMap<StateId, Mutex<BoxedState<Ctx>>>,
}

impl<Ctx> StateRegistry<Ctx> {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Register a state. A state id may be registered only once.
    pub fn add(&mut self, state: BoxedState<Ctx>) -> Result<(), ConfigurationError> {
        let id = state.id().clone();
        if self.states.contains_key(&id) {
            return Err(ConfigurationError::DuplicateState {
                name: id.name().to_string(),
            });
        }
        self.states.insert(id, Mutex::new(state));
        Ok(())
    }

    pub fn contains(&self, id: &StateId) -> bool {
        self.states.contains_key(id)
    }

    /// Lock a state. Blocks while the worker is inside one of its hooks.
    pub fn get(&self, id: &StateId) -> Option<MutexGuard<'_, BoxedState<Ctx>>> {
        self.states.get(id).map(Mutex::lock)
    }

    /// Registered id with the given name, compared case-insensitively.
    pub fn by_name(&self, name: &str) -> Option<&StateId> {
        self.states.keys().find(|id| id.is_named(name))
    }

    pub fn by_numeric_id(&self, numeric: i32) -> Option<&StateId> {
        self.states.keys().find(|id| id.id() == numeric)
    }

    /// Registered ids, sorted by numeric id.
    pub fn ids(&self) -> Vec<StateId> {
        let mut ids: Vec<StateId> = self.states.keys().cloned().collect();
        ids.sort_by_key(StateId::id);
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<Ctx> Default for StateRegistry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> std::fmt::Debug for StateRegistry<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRegistry")
            .field("states", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StateCore, Timing};
    use crate::engine::{StepContext, WakeReason};

    struct Idle {
        core: StateCore,
    }

    impl Idle {
        fn boxed(name: &'static str, id: i32) -> BoxedState<()> {
            Box::new(Self {
                core: StateCore::new(StateId::new(name, id), Timing::Infinite),
            })
        }
    }

    impl State<()> for Idle {
        fn core(&self) -> &StateCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StateCore {
            &mut self.core
        }

        fn process(&mut self, _ctx: &StepContext<'_, ()>, _wake: WakeReason) {}
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut registry = StateRegistry::new();
        registry.add(Idle::boxed("Ready", 20)).unwrap();

        let result = registry.add(Idle::boxed("READY", 20));

        assert_eq!(
            result,
            Err(ConfigurationError::DuplicateState {
                name: "READY".to_string()
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookups_by_name_and_number() {
        let mut registry = StateRegistry::new();
        registry.add(Idle::boxed("Ready", 20)).unwrap();
        registry.add(Idle::boxed("Busy", 21)).unwrap();

        assert_eq!(registry.by_name("busy"), Some(&StateId::new("Busy", 21)));
        assert_eq!(registry.by_numeric_id(20), Some(&StateId::new("Ready", 20)));
        assert!(registry.by_name("Missing").is_none());
        assert!(registry.contains(&StateId::new("ready", 20)));
    }

    #[test]
    fn ids_are_sorted() {
        let mut registry = StateRegistry::new();
        registry.add(Idle::boxed("B", 22)).unwrap();
        registry.add(Idle::boxed("A", 21)).unwrap();

        assert_eq!(
            registry.ids(),
            vec![StateId::new("A", 21), StateId::new("B", 22)]
        );
    }

    #[test]
    fn get_gives_access_to_state() {
        let mut registry = StateRegistry::new();
        registry.add(Idle::boxed("Ready", 20)).unwrap();

        let mut state = registry.get(&StateId::new("Ready", 20)).unwrap();
        state.activate();
        assert!(state.is_active());
    }
}
