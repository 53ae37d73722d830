//! Commands submitted to a running machine.
//!
//! A [`Command`] is a shared handle: the submitter keeps one clone to watch
//! the status, the engine holds another while the command is queued or
//! current. Each command owns at most one live timer at a time:
//!
//! - the *pending* timer is armed at creation and covers the wait in the
//!   queue;
//! - the *processing* timer is armed only when the status becomes
//!   `PROCESSING`.
//!
//! Either timer expiring forces the status to `TIMEOUT`, after which no
//! other status is ever applied.

use super::status::CommandStatus;
use super::timer::OneShotTimer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Shortest timeout a command accepts; shorter requests are raised to it.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(25);

static COMMAND_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Type tag of a command, typically a small `enum` owned by the device.
pub trait CommandKind: Clone + Debug + Send + Sync + 'static {}

impl<T> CommandKind for T where T: Clone + Debug + Send + Sync + 'static {}

/// Opaque argument payload.
pub type Arguments = Arc<dyn Any + Send + Sync>;

/// Status notification delivered to command callbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandEvent<K> {
    pub id: u64,
    pub kind: K,
    pub status: CommandStatus,
    pub error: Option<String>,
}

/// Callback invoked on every applied status change.
pub type StatusCallback<K> = Arc<dyn Fn(&CommandEvent<K>) + Send + Sync>;

/// Convert a millisecond timeout where `<= 0` means "none".
///
/// ```rust
/// use devfsm::command::{timeout_from_millis, MIN_TIMEOUT};
/// use std::time::Duration;
///
/// assert_eq!(timeout_from_millis(-1), None);
/// assert_eq!(timeout_from_millis(5), Some(MIN_TIMEOUT));
/// assert_eq!(timeout_from_millis(100), Some(Duration::from_millis(100)));
/// ```
pub fn timeout_from_millis(ms: i64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms as u64).max(MIN_TIMEOUT))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Pending,
    Processing,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Processing => "processing",
        }
    }
}

struct StatusCell {
    status: CommandStatus,
    reason: Option<String>,
    deadline: Option<DateTime<Utc>>,
    timer: Option<OneShotTimer>,
    generation: u64,
}

struct Shared<K> {
    id: u64,
    kind: K,
    arguments: Option<Arguments>,
    created_at: DateTime<Utc>,
    pending_timeout: Option<Duration>,
    processing_timeout: Option<Duration>,
    callbacks: Vec<StatusCallback<K>>,
    cell: Mutex<StatusCell>,
}

/// Handle to a submitted command.
///
/// Clones share the same status. Equality compares command ids.
pub struct Command<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for Command<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: CommandKind> Command<K> {
    /// Command without arguments, timeouts or callbacks.
    pub fn new(kind: K) -> Self {
        Self::builder(kind).build()
    }

    pub fn builder(kind: K) -> CommandBuilder<K> {
        CommandBuilder::new(kind)
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn kind(&self) -> &K {
        &self.shared.kind
    }

    pub fn has_arguments(&self) -> bool {
        self.shared.arguments.is_some()
    }

    /// Borrow the argument payload as `T`, if it has that type.
    pub fn arguments<T: Any>(&self) -> Option<&T> {
        self.shared.arguments.as_deref()?.downcast_ref::<T>()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.shared.created_at
    }

    pub fn pending_timeout(&self) -> Option<Duration> {
        self.shared.pending_timeout
    }

    pub fn processing_timeout(&self) -> Option<Duration> {
        self.shared.processing_timeout
    }

    pub fn status(&self) -> CommandStatus {
        self.shared.cell.lock().status
    }

    /// Reason recorded with the most recent failure-type status.
    pub fn failure_reason(&self) -> Option<String> {
        self.shared.cell.lock().reason.clone()
    }

    /// When the currently armed timer expires, if one is armed.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.shared.cell.lock().deadline
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn is_pending(&self) -> bool {
        self.status().is_pending()
    }

    pub fn in_processing(&self) -> bool {
        self.status().in_processing()
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    pub fn is_failed(&self) -> bool {
        self.status().is_failed()
    }

    pub fn is_timed_out(&self) -> bool {
        self.status().is_timed_out()
    }

    pub fn is_wrong(&self) -> bool {
        self.status().is_wrong()
    }

    /// Assign a new status.
    ///
    /// Returns `false` if nothing changed: either the status is already
    /// `status`, or the command has timed out.
    pub fn set_status(&self, status: CommandStatus) -> bool {
        self.apply(status, None)
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.apply(CommandStatus::FAILED, Some(reason.into()))
    }

    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.apply(CommandStatus::REJECTED, Some(reason.into()))
    }

    pub fn ignore(&self, reason: impl Into<String>) -> bool {
        self.apply(CommandStatus::IGNORED, Some(reason.into()))
    }

    pub fn mark_wrong(&self, reason: impl Into<String>) -> bool {
        self.apply(CommandStatus::WRONG, Some(reason.into()))
    }

    /// Mark a queued command `PENDING` unless the worker already took it
    /// or it already finished.
    pub(crate) fn mark_pending(&self) -> bool {
        self.apply_when(CommandStatus::PENDING, None, |current| {
            !current.in_processing() && !current.is_complete()
        })
    }

    fn apply(&self, status: CommandStatus, reason: Option<String>) -> bool {
        self.apply_when(status, reason, |_| true)
    }

    fn apply_when(
        &self,
        status: CommandStatus,
        reason: Option<String>,
        allowed: impl FnOnce(CommandStatus) -> bool,
    ) -> bool {
        let event = {
            let mut cell = self.shared.cell.lock();

            if cell.status.is_timed_out() || cell.status == status || !allowed(cell.status) {
                return false;
            }

            cell.status = status;
            if reason.is_some() {
                cell.reason = reason;
            }

            if status.intersects(CommandStatus::STOPS_TIMER) {
                // Expiries already in flight for the dropped timer no longer match.
                cell.generation += 1;
                cell.timer = None;
                cell.deadline = None;
            }

            if status == CommandStatus::PROCESSING {
                if let Some(timeout) = self.shared.processing_timeout {
                    arm(&self.shared, &mut cell, Phase::Processing, timeout);
                }
            }

            (status != CommandStatus::CREATED).then(|| self.event(&cell))
        };

        if let Some(event) = event {
            notify(&self.shared.callbacks, &event);
        }
        true
    }

    fn event(&self, cell: &StatusCell) -> CommandEvent<K> {
        CommandEvent {
            id: self.shared.id,
            kind: self.shared.kind.clone(),
            status: cell.status,
            error: cell.reason.clone(),
        }
    }
}

fn arm<K: CommandKind>(shared: &Arc<Shared<K>>, cell: &mut StatusCell, phase: Phase, timeout: Duration) {
    cell.generation += 1;
    let generation = cell.generation;
    let weak: Weak<Shared<K>> = Arc::downgrade(shared);

    let armed = OneShotTimer::arm(
        format!("cmd-{}-{}", shared.id, phase.label()),
        timeout,
        move || {
            if let Some(shared) = weak.upgrade() {
                expire(&shared, generation, phase, timeout);
            }
        },
    );

    match armed {
        Ok(timer) => {
            cell.timer = Some(timer);
            cell.deadline = chrono::Duration::from_std(timeout)
                .ok()
                .map(|timeout| Utc::now() + timeout);
        }
        Err(e) => {
            cell.timer = None;
            cell.deadline = None;
            warn!(
                command = shared.id,
                phase = phase.label(),
                error = %e,
                "Failed to arm command timer"
            );
        }
    }
}

fn expire<K: CommandKind>(shared: &Arc<Shared<K>>, generation: u64, phase: Phase, timeout: Duration) {
    let event = {
        let mut cell = shared.cell.lock();

        if cell.generation != generation || cell.status.is_complete() {
            return;
        }

        cell.status = CommandStatus::TIMEOUT;
        cell.reason = Some(format!("{} timeout of {timeout:?} expired", phase.label()));
        cell.timer = None;
        cell.deadline = None;

        CommandEvent {
            id: shared.id,
            kind: shared.kind.clone(),
            status: cell.status,
            error: cell.reason.clone(),
        }
    };

    warn!(
        command = shared.id,
        kind = ?shared.kind,
        phase = phase.label(),
        "Command timed out"
    );
    notify(&shared.callbacks, &event);
}

fn notify<K>(callbacks: &[StatusCallback<K>], event: &CommandEvent<K>) {
    for callback in callbacks {
        callback(event);
    }
}

impl<K> PartialEq for Command<K> {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl<K> Eq for Command<K> {}

impl<K: Debug> Debug for Command<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.shared.cell.lock();
        f.debug_struct("Command")
            .field("id", &self.shared.id)
            .field("kind", &self.shared.kind)
            .field("status", &cell.status)
            .field("has_arguments", &self.shared.arguments.is_some())
            .finish()
    }
}

/// Fluent builder for [`Command`].
///
/// ```rust
/// use devfsm::command::{Command, CommandStatus};
/// use std::time::Duration;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Op { Read, Write }
///
/// let command = Command::builder(Op::Write)
///     .arguments(42u16)
///     .processing_timeout(Duration::from_millis(500))
///     .build();
///
/// assert_eq!(command.kind(), &Op::Write);
/// assert_eq!(command.arguments::<u16>(), Some(&42));
/// assert_eq!(command.status(), CommandStatus::CREATED);
/// ```
pub struct CommandBuilder<K> {
    kind: K,
    arguments: Option<Arguments>,
    pending_timeout: Option<Duration>,
    processing_timeout: Option<Duration>,
    callbacks: Vec<StatusCallback<K>>,
}

impl<K: CommandKind> CommandBuilder<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            arguments: None,
            pending_timeout: None,
            processing_timeout: None,
            callbacks: Vec::new(),
        }
    }

    pub fn arguments<T: Any + Send + Sync>(mut self, arguments: T) -> Self {
        self.arguments = Some(Arc::new(arguments));
        self
    }

    /// Maximum time between creation and the start of processing.
    pub fn pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = Some(timeout.max(MIN_TIMEOUT));
        self
    }

    /// Maximum processing time, counted from the switch to `PROCESSING`.
    pub fn processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = Some(timeout.max(MIN_TIMEOUT));
        self
    }

    /// Timeouts in milliseconds, `<= 0` meaning none.
    pub fn timeouts_ms(mut self, pending_ms: i64, processing_ms: i64) -> Self {
        self.pending_timeout = timeout_from_millis(pending_ms);
        self.processing_timeout = timeout_from_millis(processing_ms);
        self
    }

    /// Register a status callback.
    ///
    /// Callbacks run synchronously on the thread that changed the status
    /// (a caller, the engine, or a timer thread) and must not block.
    pub fn on_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CommandEvent<K>) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn build(self) -> Command<K> {
        let id = COMMAND_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let shared = Arc::new(Shared {
            id,
            kind: self.kind,
            arguments: self.arguments,
            created_at: Utc::now(),
            pending_timeout: self.pending_timeout,
            processing_timeout: self.processing_timeout,
            callbacks: self.callbacks,
            cell: Mutex::new(StatusCell {
                status: CommandStatus::CREATED,
                reason: None,
                deadline: None,
                timer: None,
                generation: 0,
            }),
        });

        if let Some(timeout) = shared.pending_timeout {
            let mut cell = shared.cell.lock();
            arm(&shared, &mut cell, Phase::Pending, timeout);
        }

        debug!(command = id, kind = ?shared.kind, "Command created");
        Command { shared }
    }
}
