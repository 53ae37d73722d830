//! FIFO queue of pending commands.

use super::command::{Command, CommandKind};
use super::error::QueueError;
use super::status::CommandStatus;
use crate::container::{BoundedQueue, ContainerError, Order};
use crate::engine::WakeSource;
use crate::notify::{Notifier, SubscriptionId};
use tracing::{debug, warn};

/// Default capacity of a [`CommandQueue`].
pub const DEFAULT_COMMAND_QUEUE_DEPTH: usize = 128;

/// Advisory event published after every push attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandAdded<K> {
    pub id: u64,
    pub kind: K,
    /// Set when the command was not queued.
    pub error: Option<String>,
}

/// Bounded FIFO of commands awaiting processing.
///
/// Queued commands are `PENDING`. A command that reaches a terminal status
/// while still queued (a pending timeout, for instance) stays in the queue
/// until it is reached and is then skipped by [`pop_next`](Self::pop_next).
pub struct CommandQueue<K> {
    items: BoundedQueue<Command<K>>,
    added: Notifier<CommandAdded<K>>,
}

impl<K: CommandKind> CommandQueue<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: BoundedQueue::named("CommandQueue", Order::Fifo, capacity),
            added: Notifier::new("command-added"),
        }
    }

    /// Queue a command and mark it `PENDING`.
    ///
    /// A full queue rejects the command unless `force` is set; the rejected
    /// command is marked `IGNORED`. With `force`, the oldest queued
    /// commands are evicted and marked `IGNORED` instead.
    pub fn push(&self, command: &Command<K>, force: bool) -> Result<(), QueueError> {
        if !force && self.items.at_capacity() {
            let capacity = self.items.capacity();
            return Err(self.refuse(command, QueueError::AtCapacity { capacity }));
        }

        let evicted = match self.items.push_evicting(command.clone(), force) {
            Ok(evicted) => evicted,
            Err(ContainerError::AtCapacity { capacity, .. }) => {
                return Err(self.refuse(command, QueueError::AtCapacity { capacity }));
            }
            Err(e) => return Err(self.refuse(command, QueueError::Container(e))),
        };

        for dropped in evicted {
            warn!(
                command = dropped.id(),
                kind = ?dropped.kind(),
                "Command evicted from full queue"
            );
            dropped.ignore("evicted from full command queue");
        }

        command.mark_pending();
        debug!(command = command.id(), kind = ?command.kind(), "Command queued");
        self.added.publish(CommandAdded {
            id: command.id(),
            kind: command.kind().clone(),
            error: None,
        });
        Ok(())
    }

    fn refuse(&self, command: &Command<K>, error: QueueError) -> QueueError {
        let reason = error.to_string();
        warn!(command = command.id(), kind = ?command.kind(), error = %reason, "Command not queued");
        command.ignore(reason.clone());
        self.added.publish(CommandAdded {
            id: command.id(),
            kind: command.kind().clone(),
            error: Some(reason),
        });
        error
    }

    /// Remove and return the oldest command that is still waiting.
    ///
    /// Commands that completed while queued are dropped on the way.
    pub fn pop_next(&self) -> Option<Command<K>> {
        while let Some(command) = self.items.pop() {
            if command.is_complete() {
                debug!(command = command.id(), status = %command.status(), "Skipping completed command");
                continue;
            }
            return Some(command);
        }
        None
    }

    pub fn peek_next(&self) -> Option<Command<K>> {
        self.items.peek()
    }

    /// Whether any queued command is still waiting to be processed.
    pub fn command_pending(&self) -> bool {
        self.items
            .snapshot(false)
            .iter()
            .any(|command| !command.is_complete())
    }

    /// Empty the queue, assigning `status` to every removed command.
    ///
    /// Returns the number of removed commands.
    pub fn purge(&self, status: CommandStatus) -> usize {
        let drained = self.items.drain();
        for command in &drained {
            command.set_status(status);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), status = %status, "Command queue purged");
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Commands evicted by forced pushes since the last reset.
    pub fn lost_count(&self) -> u64 {
        self.items.lost_count()
    }

    pub fn subscribe_added<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&CommandAdded<K>) + Send + Sync + 'static,
    {
        self.added.subscribe(handler)
    }

    pub fn unsubscribe_added(&self, id: SubscriptionId) -> bool {
        self.added.unsubscribe(id)
    }
}

impl<K: CommandKind> Default for CommandQueue<K> {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_QUEUE_DEPTH)
    }
}

impl<K: CommandKind> WakeSource for CommandQueue<K> {
    fn has_pending(&self) -> bool {
        self.command_pending()
    }
}

impl<K> std::fmt::Debug for CommandQueue<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("items", &self.items)
            .finish()
    }
}
