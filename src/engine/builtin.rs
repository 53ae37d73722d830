//! States every machine has.

use super::context::StepContext;
use super::idling::WakeReason;
use crate::core::{ExitStatus, State, StateCore, StateId, Timing};

/// `Start`, `Stop` and `End`.
///
/// `Start` completes on its first processing step, so a machine needs a
/// `Start --Complete--> ...` transition to get going. `Stop` and `End` are
/// terminal: entering either ends the worker loop.
#[derive(Clone, Debug)]
pub struct BuiltinState {
    core: StateCore,
}

impl BuiltinState {
    pub fn start() -> Self {
        Self::new(StateId::START)
    }

    pub fn stop() -> Self {
        Self::new(StateId::STOP)
    }

    pub fn end() -> Self {
        Self::new(StateId::END)
    }

    fn new(id: StateId) -> Self {
        Self {
            core: StateCore::new(id, Timing::Continuous),
        }
    }
}

impl<Ctx> State<Ctx> for BuiltinState {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    fn process(&mut self, _ctx: &StepContext<'_, Ctx>, _wake: WakeReason) {
        self.core.set_status(ExitStatus::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StateMachine;

    #[test]
    fn builtins_have_reserved_ids() {
        assert_eq!(State::<()>::id(&BuiltinState::start()), &StateId::START);
        assert_eq!(State::<()>::id(&BuiltinState::stop()), &StateId::STOP);
        assert_eq!(State::<()>::id(&BuiltinState::end()), &StateId::END);
    }

    #[test]
    fn builtins_run_continuously() {
        let state = BuiltinState::start();
        assert_eq!(State::<()>::timing(&state), Timing::Continuous);
        assert_eq!(State::<()>::status(&state), ExitStatus::NA);
    }

    #[test]
    fn start_completes_into_first_transition() {
        let machine = StateMachine::builder("builtins-only")
            .transition(StateId::START, ExitStatus::Complete, StateId::END)
            .build(())
            .unwrap();
        machine.start().unwrap();

        for _ in 0..200 {
            if !machine.is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert!(!machine.is_running());
        assert_eq!(machine.current_state(), StateId::END);
        assert_eq!(machine.previous_state(), Some(StateId::START));
        machine.stop().unwrap();
    }
}
