//! State identity.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a state: a name plus a numeric id.
///
/// Names compare case-insensitively, so `"Idle"` and `"IDLE"` with the same
/// numeric id are the same state.
///
/// ```rust
/// use devfsm::core::StateId;
///
/// const IDLE: StateId = StateId::new("Idle", 10);
///
/// assert_eq!(IDLE, StateId::owned("IDLE", 10));
/// assert_ne!(IDLE, StateId::new("Idle", 11));
/// assert!(StateId::STOP.is_terminal());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateId {
    name: Cow<'static, str>,
    id: i32,
}

impl StateId {
    pub const NA: StateId = StateId::new("NA", 0);
    /// Initial state entered when a machine is built.
    pub const START: StateId = StateId::new("Start", 1);
    /// Terminal sentinel; reaching it ends the worker loop.
    pub const STOP: StateId = StateId::new("Stop", 2);
    /// Terminal sentinel; reaching it ends the worker loop.
    pub const END: StateId = StateId::new("End", 3);
    /// Fallback target when a transition cannot be resolved.
    pub const TRANSITION_ERROR: StateId = StateId::new("TransitionError", 4);

    /// Ids below this value are reserved for the built-in states.
    pub const FIRST_USER_ID: i32 = 16;

    pub const fn new(name: &'static str, id: i32) -> Self {
        Self {
            name: Cow::Borrowed(name),
            id,
        }
    }

    pub fn owned(name: impl Into<String>, id: i32) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Case-insensitive name match, ignoring the numeric id.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// `Stop` or `End`.
    pub fn is_terminal(&self) -> bool {
        *self == Self::STOP || *self == Self::END
    }
}

impl PartialEq for StateId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for StateId {}

impl Hash for StateId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_name_case() {
        assert_eq!(StateId::new("Ready", 20), StateId::owned("READY", 20));
        assert_ne!(StateId::new("Ready", 20), StateId::new("Ready", 21));
        assert_ne!(StateId::new("Ready", 20), StateId::new("Busy", 20));
    }

    #[test]
    fn hash_is_consistent_with_equality() {
        let mut set = HashSet::new();
        set.insert(StateId::new("Ready", 20));
        assert!(set.contains(&StateId::owned("ready", 20)));
        assert!(!set.insert(StateId::owned("READY", 20)));
    }

    #[test]
    fn builtin_ids_are_distinct() {
        let builtins = [
            StateId::NA,
            StateId::START,
            StateId::STOP,
            StateId::END,
            StateId::TRANSITION_ERROR,
        ];
        let ids: HashSet<i32> = builtins.iter().map(StateId::id).collect();
        assert_eq!(ids.len(), builtins.len());
        assert!(ids.iter().all(|id| *id < StateId::FIRST_USER_ID));
    }

    #[test]
    fn only_stop_and_end_are_terminal() {
        assert!(StateId::STOP.is_terminal());
        assert!(StateId::END.is_terminal());
        assert!(!StateId::START.is_terminal());
        assert!(!StateId::TRANSITION_ERROR.is_terminal());
    }

    #[test]
    fn is_named_matches_any_case() {
        assert!(StateId::TRANSITION_ERROR.is_named("transitionerror"));
        assert!(!StateId::START.is_named("Stop"));
    }

    #[test]
    fn state_id_serializes_correctly() {
        let id = StateId::new("Loaded", 30);
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: StateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
        assert_eq!(deserialized.name(), "Loaded");
    }
}
