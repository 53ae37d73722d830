//! The worker loop and its control surface.

use super::builder::StateMachineBuilder;
use super::context::StepContext;
use super::error::EngineError;
use super::idling::{WaitHandle, WakeReason, WakeSource};
use super::settings::EngineSettings;
use super::watchdog::Watchdog;
use crate::container::{BoundedQueue, Order};
use crate::core::{ExitStatus, HistoryEntry, StateHistory, StateId, Timing};
use crate::notify::{Notifier, SubscriptionId};
use crate::registry::{BoxedState, StateRegistry};
use crate::transition::{Registration, TransitionError, TransitionTable};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Dispatch};
use uuid::Uuid;

/// Advisory notification published after every transition.
///
/// Delivered asynchronously; consecutive notifications may arrive out of
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub machine: String,
    pub instance: Uuid,
    pub previous: StateId,
    /// Exit status of `previous` that triggered the transition
    pub trigger: ExitStatus,
    pub current: StateId,
    pub at: DateTime<Utc>,
}

/// Engine state that does not depend on the context type.
pub(crate) struct EngineCore {
    name: String,
    instance: Uuid,
    settings: EngineSettings,
    wait: Arc<WaitHandle>,
    alive: AtomicBool,
    runs: AtomicU64,
    current: RwLock<StateId>,
    history: StateHistory,
    state_queue: BoundedQueue<StateId>,
    transitions: RwLock<TransitionTable>,
    changes: Notifier<StateChanged>,
    wake_source: Option<Arc<dyn WakeSource>>,
    reentry: Arc<Mutex<()>>,
    missed_ticks: Arc<AtomicU64>,
    max_exec_nanos: AtomicU64,
}

impl EngineCore {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub(crate) fn previous_state(&self) -> Option<StateId> {
        self.history.previous().map(|entry| entry.state)
    }

    pub(crate) fn queue_state<Ctx>(
        &self,
        registry: &StateRegistry<Ctx>,
        state: StateId,
    ) -> Result<(), EngineError> {
        if !registry.contains(&state) {
            return Err(EngineError::UnknownState {
                name: state.name().to_string(),
            });
        }
        self.state_queue.push(state, false)?;
        Ok(())
    }

    pub(crate) fn in_state_sequence(&self) -> bool {
        !self.state_queue.is_empty()
    }

    pub(crate) fn cancellation_requested(&self) -> bool {
        self.wait.is_cancelled()
    }

    fn idle(&self) -> WakeReason {
        self.wait.wait(|| {
            self.wake_source
                .as_ref()
                .is_some_and(|source| source.has_pending())
        })
    }

    fn record_exec_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.max_exec_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    fn arm_watchdog(&self, state: &StateId, timing: Timing) -> Option<Watchdog> {
        let period = timing.period()?;
        let armed = Watchdog::arm(
            &self.name,
            period,
            Arc::clone(&self.wait),
            Arc::clone(&self.reentry),
            Arc::clone(&self.missed_ticks),
        );
        match armed {
            Ok(watchdog) => Some(watchdog),
            Err(e) => {
                error!(state = %state, error = %e, "Failed to arm watchdog");
                None
            }
        }
    }

    fn disarm_watchdog(&self, watchdog: &mut Option<Watchdog>) {
        let _reentry = self.reentry.lock();
        watchdog.take();
    }
}

struct AliveGuard<'a>(&'a AtomicBool);

impl<'a> AliveGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Engine<Ctx> {
    core: EngineCore,
    registry: StateRegistry<Ctx>,
    shared: Arc<Ctx>,
}

impl<Ctx: Send + Sync + 'static> Engine<Ctx> {
    fn with_state<R>(
        &self,
        id: &StateId,
        f: impl FnOnce(&mut BoxedState<Ctx>, &StepContext<'_, Ctx>) -> R,
    ) -> Option<R> {
        let Some(mut state) = self.registry.get(id) else {
            error!(state = %id, "State is not registered");
            return None;
        };
        let ctx = StepContext {
            shared: &*self.shared,
            core: &self.core,
            registry: &self.registry,
            state: id,
        };
        Some(f(&mut state, &ctx))
    }

    fn run(&self) {
        let core = &self.core;
        let _alive = AliveGuard::raise(&core.alive);
        core.runs.fetch_add(1, Ordering::AcqRel);

        let span = info_span!("fsm", machine = %core.name, instance = %core.instance);
        let _entered = span.enter();
        info!("Engine started");

        let mut watchdog = None;
        let mut current = core.current.read().clone();
        if !self.enter(&current, &mut watchdog) {
            return;
        }

        while !current.is_terminal() {
            let Some(exit_status) = self.drive(&current) else {
                core.disarm_watchdog(&mut watchdog);
                self.with_state(&current, |state, ctx| state.exit(ctx));
                warn!(state = %current, "Cancellation requested");
                break;
            };

            core.disarm_watchdog(&mut watchdog);
            self.with_state(&current, |state, ctx| state.exit(ctx));

            let Some(next) = self.select_next(&current, exit_status) else {
                break;
            };

            core.history.record(current.clone(), exit_status);
            let previous = std::mem::replace(&mut current, next);
            if !self.enter(&current, &mut watchdog) {
                break;
            }

            core.changes.publish(StateChanged {
                machine: core.name.clone(),
                instance: core.instance,
                previous,
                trigger: exit_status,
                current: current.clone(),
                at: Utc::now(),
            });
        }

        core.disarm_watchdog(&mut watchdog);
        info!(state = %current, "Engine stopped");
    }

    /// Run the processing steps of `id` until it is no longer active.
    ///
    /// Returns `None` when cancelled.
    fn drive(&self, id: &StateId) -> Option<ExitStatus> {
        let mut wake = WakeReason::NotIdled;
        loop {
            if self.core.cancellation_requested() {
                return None;
            }

            let started = Instant::now();
            let (status, timing) = self.with_state(id, |state, ctx| {
                state.process(ctx, wake);
                (state.status(), state.timing())
            })?;
            self.core.record_exec_time(started.elapsed());

            if status != ExitStatus::Active {
                return Some(status);
            }

            wake = if timing.uses_idling() {
                self.core.idle()
            } else {
                WakeReason::ContinuousRun
            };
        }
    }

    fn enter(&self, id: &StateId, watchdog: &mut Option<Watchdog>) -> bool {
        *self.core.current.write() = id.clone();
        self.core.wait.reset();

        let timing = self.with_state(id, |state, ctx| {
            state.activate();
            state.enter(ctx);
            state.timing()
        });

        match timing {
            Some(timing) => {
                *watchdog = self.core.arm_watchdog(id, timing);
                true
            }
            None => false,
        }
    }

    fn select_next(&self, current: &StateId, status: ExitStatus) -> Option<StateId> {
        let log_transitions = self.core.settings.log_transitions;

        if let Some(queued) = self.core.state_queue.pop() {
            if log_transitions {
                debug!(from = %current, trigger = %status, to = %queued, "Transition to queued state");
            }
            return Some(queued);
        }

        let resolved = self.core.transitions.read().next_state(current, status);
        let next = match resolved {
            Ok(next) => next,
            Err(e) => match self.registry.by_name(StateId::TRANSITION_ERROR.name()) {
                Some(fallback) => {
                    warn!(error = %e, fallback = %fallback, "Transition not defined, using fallback state");
                    fallback.clone()
                }
                None => {
                    error!(error = %e, "Transition not defined, stopping engine");
                    return None;
                }
            },
        };

        if log_transitions {
            debug!(from = %current, trigger = %status, to = %next, "Transition");
        }
        Some(next)
    }
}

/// A running (or runnable) state machine.
///
/// Owns one worker thread at most. States run on that thread only; every
/// other method may be called from any thread.
///
/// # Example
///
/// ```rust
/// use devfsm::core::{ExitStatus, State, StateCore, StateId, Timing};
/// use devfsm::engine::{StateMachine, StepContext, WakeReason};
/// use std::time::Duration;
///
/// const WORK: StateId = StateId::new("Work", 20);
///
/// struct Work {
///     core: StateCore,
///     steps: u32,
/// }
///
/// impl State<()> for Work {
///     fn core(&self) -> &StateCore { &self.core }
///     fn core_mut(&mut self) -> &mut StateCore { &mut self.core }
///
///     fn process(&mut self, _ctx: &StepContext<'_, ()>, _wake: WakeReason) {
///         self.steps += 1;
///         if self.steps == 3 {
///             self.set_status(ExitStatus::Complete);
///         }
///     }
/// }
///
/// let machine = StateMachine::builder("demo")
///     .state(Work { core: StateCore::new(WORK, Timing::Continuous), steps: 0 })
///     .transition(StateId::START, ExitStatus::Complete, WORK)
///     .transition(WORK, ExitStatus::Complete, StateId::STOP)
///     .build(())
///     .unwrap();
///
/// machine.start().unwrap();
/// for _ in 0..200 {
///     if machine.current_state() == StateId::STOP { break; }
///     std::thread::sleep(Duration::from_millis(5));
/// }
/// assert_eq!(machine.current_state(), StateId::STOP);
/// assert_eq!(machine.previous_state(), Some(WORK));
/// machine.stop().unwrap();
/// ```
pub struct StateMachine<Ctx: Send + Sync + 'static> {
    engine: Arc<Engine<Ctx>>,
    dispatch: Option<Dispatch>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<Ctx: Send + Sync + 'static> StateMachine<Ctx> {
    pub fn builder(name: impl Into<String>) -> StateMachineBuilder<Ctx> {
        StateMachineBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        settings: EngineSettings,
        registry: StateRegistry<Ctx>,
        transitions: TransitionTable,
        shared: Arc<Ctx>,
        wake_source: Option<Arc<dyn WakeSource>>,
        dispatch: Option<Dispatch>,
    ) -> Self {
        let core = EngineCore {
            instance: Uuid::new_v4(),
            wait: Arc::new(WaitHandle::new()),
            alive: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            current: RwLock::new(StateId::START),
            history: StateHistory::new(settings.history_depth),
            state_queue: BoundedQueue::named(
                format!("{name}-StateQueue"),
                Order::Fifo,
                settings.state_queue_depth,
            ),
            transitions: RwLock::new(transitions),
            changes: Notifier::new("state-changed"),
            wake_source,
            reentry: Arc::new(Mutex::new(())),
            missed_ticks: Arc::new(AtomicU64::new(0)),
            max_exec_nanos: AtomicU64::new(0),
            settings,
            name,
        };

        Self {
            engine: Arc::new(Engine {
                core,
                registry,
                shared,
            }),
            dispatch,
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.engine.core.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.engine.core.instance
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.engine.core.settings
    }

    /// The context object shared with every state.
    pub fn shared(&self) -> &Arc<Ctx> {
        &self.engine.shared
    }

    /// Spawn the worker thread.
    ///
    /// Does nothing if the worker is already alive. A machine that stopped
    /// in `Stop` or `End` starts over from `Start`.
    pub fn start(&self) -> Result<(), EngineError> {
        self.logged(|| {
            let mut worker = self.worker.lock();
            if self.is_running() {
                debug!(machine = %self.name(), "Engine already running");
                return Ok(());
            }
            if let Some(finished) = worker.take() {
                if finished.join().is_err() {
                    warn!(machine = %self.name(), "Previous worker thread panicked");
                }
            }

            let core = &self.engine.core;
            core.wait.rearm();
            let terminal = core.current.read().is_terminal();
            if terminal {
                *core.current.write() = StateId::START;
                core.state_queue.clear();
            }

            let runs = core.runs.load(Ordering::Acquire);
            let engine = Arc::clone(&self.engine);
            let dispatch = self.dispatch.clone();
            let handle = thread::Builder::new()
                .name(format!("fsm-{}", core.name))
                .spawn(move || match dispatch {
                    Some(dispatch) => tracing::dispatcher::with_default(&dispatch, || engine.run()),
                    None => engine.run(),
                })?;
            *worker = Some(handle);

            let timeout = core.settings.start_timeout_duration();
            let deadline = Instant::now() + timeout;
            while core.runs.load(Ordering::Acquire) == runs {
                if Instant::now() >= deadline {
                    error!(machine = %core.name, ?timeout, "Worker thread did not start");
                    return Err(EngineError::StartTimeout { waited: timeout });
                }
                thread::sleep(core.settings.start_poll_interval());
            }
            Ok(())
        })
    }

    /// Request the worker to stop and wait for it.
    ///
    /// A parked worker is woken first. If it does not finish within the join
    /// timeout the machine is reported [`EngineError::Unresponsive`]; the
    /// thread is never killed.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.logged(|| {
            let mut worker = self.worker.lock();
            let Some(handle) = worker.take() else {
                return Ok(());
            };

            let core = &self.engine.core;
            core.wait.cancel();

            let timeout = core.settings.join_timeout_duration();
            let deadline = Instant::now() + timeout;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    error!(machine = %core.name, ?timeout, "Worker thread did not stop, machine is unresponsive");
                    *worker = Some(handle);
                    return Err(EngineError::Unresponsive { timeout });
                }
                thread::sleep(Duration::from_millis(1));
            }

            if handle.join().is_err() {
                error!(machine = %core.name, "Worker thread panicked");
            }
            info!(machine = %core.name, "Engine stop completed");
            Ok(())
        })
    }

    /// Wake the worker. Returns whether it was parked; if it was not, its
    /// next idling wait returns at once with [`WakeReason::Interrupted`].
    pub fn resume(&self) -> bool {
        self.engine.core.wait.resume()
    }

    pub fn is_running(&self) -> bool {
        self.engine.core.alive.load(Ordering::Acquire)
    }

    /// Whether the worker is parked in an idling wait.
    pub fn is_idling(&self) -> bool {
        self.engine.core.wait.is_waiting()
    }

    pub fn current_state(&self) -> StateId {
        self.engine.core.current.read().clone()
    }

    pub fn previous_state(&self) -> Option<StateId> {
        self.engine.core.previous_state()
    }

    /// Exited states, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.engine.core.history.entries(true)
    }

    pub fn state_history(&self) -> &StateHistory {
        &self.engine.core.history
    }

    /// Registered states, sorted by numeric id.
    pub fn states(&self) -> Vec<StateId> {
        self.engine.registry.ids()
    }

    /// Make `state` the next state, ahead of the transition table.
    pub fn queue_state(&self, state: StateId) -> Result<(), EngineError> {
        self.engine.core.queue_state(&self.engine.registry, state)
    }

    /// Queue several override states, taken one per transition in order.
    ///
    /// Nothing is queued if any of them is unknown.
    pub fn queue_states(&self, states: impl IntoIterator<Item = StateId>) -> Result<(), EngineError> {
        let states: Vec<StateId> = states.into_iter().collect();
        if let Some(unknown) = states.iter().find(|s| !self.engine.registry.contains(s)) {
            return Err(EngineError::UnknownState {
                name: unknown.name().to_string(),
            });
        }
        for state in states {
            self.engine.core.state_queue.push(state, false)?;
        }
        Ok(())
    }

    pub fn in_state_sequence(&self) -> bool {
        self.engine.core.in_state_sequence()
    }

    /// Register a transition on a machine that is not running.
    pub fn add_transition(
        &self,
        from: StateId,
        status: ExitStatus,
        to: StateId,
    ) -> Result<Registration, TransitionError> {
        if self.is_running() {
            return Err(TransitionError::EngineRunning);
        }
        for state in [&from, &to] {
            if !self.engine.registry.contains(state) {
                return Err(TransitionError::UnknownState {
                    name: state.name().to_string(),
                });
            }
        }
        self.engine.core.transitions.write().add(from, status, to)
    }

    /// Snapshot of the transition table.
    pub fn transitions(&self) -> TransitionTable {
        self.engine.core.transitions.read().clone()
    }

    pub fn subscribe_state_changes<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StateChanged) + Send + Sync + 'static,
    {
        self.engine.core.changes.subscribe(handler)
    }

    pub fn unsubscribe_state_changes(&self, id: SubscriptionId) -> bool {
        self.engine.core.changes.unsubscribe(id)
    }

    /// Watchdog ticks discarded because delivery was contended.
    pub fn missed_ticks(&self) -> u64 {
        self.engine.core.missed_ticks.load(Ordering::Relaxed)
    }

    /// Longest single processing step observed.
    pub fn max_exec_time(&self) -> Duration {
        Duration::from_nanos(self.engine.core.max_exec_nanos.load(Ordering::Relaxed))
    }

    pub fn reset_stats(&self) {
        self.engine.core.missed_ticks.store(0, Ordering::Relaxed);
        self.engine.core.max_exec_nanos.store(0, Ordering::Relaxed);
    }

    fn logged<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl<Ctx: Send + Sync + 'static> Drop for StateMachine<Ctx> {
    fn drop(&mut self) {
        let has_worker = self.worker.lock().is_some();
        if has_worker {
            if let Err(e) = self.stop() {
                warn!(machine = %self.name(), error = %e, "Failed to stop engine on drop");
            }
        }
    }
}

impl<Ctx: Send + Sync + 'static> std::fmt::Debug for StateMachine<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name())
            .field("instance", &self.instance_id())
            .field("current", &self.current_state())
            .field("running", &self.is_running())
            .finish()
    }
}
