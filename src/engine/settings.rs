//! Engine tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of a [`StateMachine`](super::StateMachine).
///
/// Missing fields take their defaults when deserialized:
///
/// ```rust
/// use devfsm::engine::EngineSettings;
///
/// let settings: EngineSettings = serde_json::from_str(r#"{ "history_depth": 8 }"#).unwrap();
/// assert_eq!(settings.history_depth, 8);
/// assert_eq!(settings.command_queue_depth, 128);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Exited states kept in the history
    pub history_depth: usize,
    /// Capacity of the override state queue
    pub state_queue_depth: usize,
    /// Capacity of command queues created for this machine
    pub command_queue_depth: usize,
    /// How long `start` waits for the worker to come alive
    pub start_timeout_ms: u64,
    /// How often `start` checks the worker while waiting
    pub start_poll_interval_ms: u64,
    /// How long `stop` waits for the worker to finish
    pub join_timeout_ms: u64,
    /// How long configuration updates wait for the configuration lock
    pub configuration_lock_timeout_ms: u64,
    /// Log every resolved transition at debug level
    pub log_transitions: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_depth: 32,
            state_queue_depth: 128,
            command_queue_depth: 128,
            start_timeout_ms: 50,
            start_poll_interval_ms: 1,
            join_timeout_ms: 5000,
            configuration_lock_timeout_ms: 2000,
            log_transitions: false,
        }
    }
}

impl EngineSettings {
    pub fn history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn state_queue_depth(mut self, depth: usize) -> Self {
        self.state_queue_depth = depth;
        self
    }

    pub fn command_queue_depth(mut self, depth: usize) -> Self {
        self.command_queue_depth = depth;
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn configuration_lock_timeout(mut self, timeout: Duration) -> Self {
        self.configuration_lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn log_transitions(mut self, enabled: bool) -> Self {
        self.log_transitions = enabled;
        self
    }

    pub(crate) fn start_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub(crate) fn start_poll_interval(&self) -> Duration {
        Duration::from_millis(self.start_poll_interval_ms.max(1))
    }

    pub(crate) fn join_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn configuration_lock_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.configuration_lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.history_depth, 32);
        assert_eq!(settings.state_queue_depth, 128);
        assert_eq!(settings.start_timeout_ms, 50);
        assert_eq!(settings.join_timeout_ms, 5000);
        assert_eq!(settings.configuration_lock_timeout_ms, 2000);
        assert!(!settings.log_transitions);
    }

    #[test]
    fn setters_chain() {
        let settings = EngineSettings::default()
            .history_depth(4)
            .join_timeout(Duration::from_millis(250))
            .log_transitions(true);
        assert_eq!(settings.history_depth, 4);
        assert_eq!(settings.join_timeout_duration(), Duration::from_millis(250));
        assert!(settings.log_transitions);
    }

    #[test]
    fn settings_serialize_correctly() {
        let settings = EngineSettings::default().state_queue_depth(16);
        let json = serde_json::to_string(&settings).unwrap();
        let deserialized: EngineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn zero_poll_interval_is_raised() {
        let settings = EngineSettings {
            start_poll_interval_ms: 0,
            ..EngineSettings::default()
        };
        assert_eq!(settings.start_poll_interval(), Duration::from_millis(1));
    }
}
