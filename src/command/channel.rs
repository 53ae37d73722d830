//! Command queue paired with the single "current command" slot.

use super::command::{Command, CommandKind};
use super::error::QueueError;
use super::queue::{CommandAdded, CommandQueue};
use super::status::CommandStatus;
use crate::engine::WakeSource;
use crate::notify::SubscriptionId;
use parking_lot::Mutex;
use tracing::debug;

/// What a device's states see of its commands.
///
/// External callers [`submit`](Self::submit); the state currently handling
/// commands calls [`dequeue_next`](Self::dequeue_next), works on
/// [`current`](Self::current) and finishes it with one of the
/// `*_current` methods.
pub struct CommandChannel<K> {
    queue: CommandQueue<K>,
    current: Mutex<Option<Command<K>>>,
}

impl<K: CommandKind> CommandChannel<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: CommandQueue::new(capacity),
            current: Mutex::new(None),
        }
    }

    pub fn queue(&self) -> &CommandQueue<K> {
        &self.queue
    }

    pub fn submit(&self, command: &Command<K>, force: bool) -> Result<(), QueueError> {
        self.queue.push(command, force)
    }

    /// Move the next waiting command into the current slot and mark it
    /// `PROCESSING`.
    ///
    /// Returns `None` and leaves the slot untouched while a current command
    /// is still unfinished.
    pub fn dequeue_next(&self) -> Option<Command<K>> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|command| !command.is_complete()) {
            return None;
        }

        let next = self.queue.pop_next()?;
        next.set_status(CommandStatus::PROCESSING);
        debug!(command = next.id(), kind = ?next.kind(), "Command processing");
        *current = Some(next.clone());
        Some(next)
    }

    pub fn current(&self) -> Option<Command<K>> {
        self.current.lock().clone()
    }

    /// Assign `status` to the current command. Returns `false` when there is
    /// no current command or the status was not applied.
    pub fn complete_current(&self, status: CommandStatus) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|command| command.set_status(status))
    }

    pub fn succeed_current(&self) -> bool {
        self.complete_current(CommandStatus::SUCCESS)
    }

    pub fn fail_current(&self, reason: impl Into<String>) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|command| command.fail(reason))
    }

    pub fn timeout_current(&self) -> bool {
        self.complete_current(CommandStatus::TIMEOUT)
    }

    /// Empty the current slot, returning what it held.
    pub fn take_current(&self) -> Option<Command<K>> {
        self.current.lock().take()
    }

    pub fn clear_current(&self) {
        self.current.lock().take();
    }

    /// Whether the current command is unfinished or any queued command is
    /// still waiting.
    pub fn active_or_pending(&self) -> bool {
        let busy = self
            .current
            .lock()
            .as_ref()
            .is_some_and(|command| command.is_active());
        busy || self.queue.command_pending()
    }

    /// Empty the queue and the current slot, assigning `status` to every
    /// unfinished command. Returns the number of commands affected.
    pub fn purge(&self, status: CommandStatus) -> usize {
        let mut purged = self.queue.purge(status);
        if let Some(command) = self.current.lock().take() {
            if !command.is_complete() && command.set_status(status) {
                purged += 1;
            }
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn subscribe_added<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&CommandAdded<K>) + Send + Sync + 'static,
    {
        self.queue.subscribe_added(handler)
    }
}

impl<K: CommandKind> Default for CommandChannel<K> {
    fn default() -> Self {
        Self {
            queue: CommandQueue::default(),
            current: Mutex::new(None),
        }
    }
}

impl<K: CommandKind> WakeSource for CommandChannel<K> {
    fn has_pending(&self) -> bool {
        self.queue.command_pending()
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for CommandChannel<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("queue", &self.queue)
            .field("current", &*self.current.lock())
            .finish()
    }
}
