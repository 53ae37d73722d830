//! Shared context of command-driven devices.

use crate::command::{CommandChannel, CommandKind};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;

/// What the states of a command-driven device share.
///
/// The configuration is copied in and out; nobody outside the lock ever
/// holds a reference into it.
pub struct DeviceContext<Cfg, K, D> {
    pub(crate) configuration: Mutex<Option<Cfg>>,
    driver: Mutex<D>,
    commands: Arc<CommandChannel<K>>,
}

impl<Cfg: Clone, K: CommandKind, D> DeviceContext<Cfg, K, D> {
    pub(crate) fn new(driver: D, commands: Arc<CommandChannel<K>>) -> Self {
        Self {
            configuration: Mutex::new(None),
            driver: Mutex::new(driver),
            commands,
        }
    }

    /// Copy of the current configuration.
    pub fn configuration(&self) -> Option<Cfg> {
        self.configuration.lock().clone()
    }

    /// Like [`configuration`](Self::configuration), giving up after
    /// `timeout`. The outer `None` means the lock was not acquired.
    pub fn try_configuration(&self, timeout: Duration) -> Option<Option<Cfg>> {
        self.configuration
            .try_lock_for(timeout)
            .map(|configuration| configuration.clone())
    }

    pub fn configuration_is_set(&self) -> bool {
        self.configuration.lock().is_some()
    }

    /// Exclusive access to the driver.
    pub fn driver(&self) -> MutexGuard<'_, D> {
        self.driver.lock()
    }

    pub fn commands(&self) -> &CommandChannel<K> {
        &self.commands
    }

    pub(crate) fn command_channel(&self) -> &Arc<CommandChannel<K>> {
        &self.commands
    }
}

impl<Cfg, K, D> std::fmt::Debug for DeviceContext<Cfg, K, D>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("configured", &self.configuration.lock().is_some())
            .field("commands", &self.commands)
            .finish()
    }
}
