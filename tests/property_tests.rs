//! Property-based tests for containers, the transition table and commands.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use devfsm::command::{Command, CommandStatus};
use devfsm::container::{BoundedQueue, ContainerError, Order};
use devfsm::core::{ExitStatus, StateId};
use devfsm::transition::{Registration, TransitionError, TransitionTable};
use proptest::prelude::*;

prop_compose! {
    fn arbitrary_status()(index in 0..ExitStatus::ALL.len()) -> ExitStatus {
        ExitStatus::ALL[index]
    }
}

prop_compose! {
    fn arbitrary_state()(id in 16..64i32) -> StateId {
        StateId::owned(format!("S{id}"), id)
    }
}

prop_compose! {
    fn arbitrary_command_status()(bits in prop::sample::select(vec![
        CommandStatus::PENDING,
        CommandStatus::PROCESSING,
        CommandStatus::SUCCESS,
        CommandStatus::FAILED,
        CommandStatus::IGNORED,
        CommandStatus::REJECTED,
        CommandStatus::WRONG,
    ])) -> CommandStatus {
        bits
    }
}

proptest! {
    #[test]
    fn unforced_pushes_stop_at_capacity(capacity in 1usize..32, pushes in 0usize..64) {
        let queue = BoundedQueue::named("prop", Order::Fifo, capacity);
        let mut refused = 0;
        for n in 0..pushes {
            if queue.push(n, false).is_err() {
                refused += 1;
            }
        }

        prop_assert_eq!(queue.len(), pushes.min(capacity));
        prop_assert_eq!(refused, pushes.saturating_sub(capacity));
        prop_assert_eq!(queue.lost_count(), 0);
    }

    #[test]
    fn push_past_capacity_fails_and_keeps_count(capacity in 1usize..32) {
        let queue = BoundedQueue::named("prop", Order::Fifo, capacity);
        for n in 0..capacity {
            prop_assert!(queue.push(n, false).is_ok());
        }

        let result = queue.push(capacity, false);
        prop_assert_eq!(
            result,
            Err(ContainerError::AtCapacity { name: "prop".to_string(), capacity })
        );
        prop_assert_eq!(queue.len(), capacity);
    }

    #[test]
    fn forced_pushes_never_exceed_capacity(capacity in 1usize..32, pushes in 0usize..96) {
        let queue = BoundedQueue::named("prop", Order::Fifo, capacity);
        let mut evicted = 0;
        for n in 0..pushes {
            evicted += queue.push(n, true).unwrap();
            prop_assert!(queue.len() <= capacity);
        }

        prop_assert_eq!(evicted, pushes.saturating_sub(capacity));
        prop_assert_eq!(queue.lost_count(), evicted as u64);
        // Survivors are the newest items, oldest first.
        let expected: Vec<usize> = (pushes.saturating_sub(capacity)..pushes).collect();
        prop_assert_eq!(queue.drain(), expected);
    }

    #[test]
    fn registering_same_transition_is_idempotent(
        from in arbitrary_state(),
        status in arbitrary_status(),
        to in arbitrary_state(),
    ) {
        let mut table = TransitionTable::new();
        prop_assert_eq!(table.add(from.clone(), status, to.clone()), Ok(Registration::Inserted));
        prop_assert_eq!(table.add(from.clone(), status, to.clone()), Ok(Registration::AlreadyPresent));

        prop_assert_eq!(table.len(), 1);
        prop_assert_eq!(table.next_state(&from, status), Ok(to));
    }

    #[test]
    fn conflicting_transition_keeps_original(
        from in arbitrary_state(),
        status in arbitrary_status(),
        to in arbitrary_state(),
        other in arbitrary_state(),
    ) {
        prop_assume!(to != other);
        let mut table = TransitionTable::new();
        table.add(from.clone(), status, to.clone()).unwrap();

        let result = table.add(from.clone(), status, other);
        prop_assert!(matches!(result, Err(TransitionError::Conflict { .. })), "unexpected {:?}", result);
        prop_assert_eq!(table.next_state(&from, status), Ok(to));
    }

    #[test]
    fn unregistered_trigger_resolves_only_for_self_defaults(
        state in arbitrary_state(),
        status in arbitrary_status(),
    ) {
        let table = TransitionTable::new();
        let resolved = table.next_state(&state, status);
        if status.defaults_to_self() {
            prop_assert_eq!(resolved, Ok(state));
        } else {
            let is_not_defined = matches!(resolved, Err(TransitionError::NotDefined { .. }));
            prop_assert!(is_not_defined);
        }
    }

    #[test]
    fn timed_out_command_never_changes(
        statuses in prop::collection::vec(arbitrary_command_status(), 1..16),
    ) {
        let command = Command::new("probe");
        command.set_status(CommandStatus::TIMEOUT);
        for status in statuses {
            prop_assert!(!command.set_status(status));
        }
        prop_assert_eq!(command.status(), CommandStatus::TIMEOUT);
    }
}
