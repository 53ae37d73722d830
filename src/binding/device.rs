//! Configuration, driver and engine behind one handle.

use super::context::DeviceContext;
use super::driver::HardwareDriver;
use super::error::BindingError;
use crate::command::{Command, CommandChannel, CommandKind, CommandStatus};
use crate::core::StateId;
use crate::engine::{
    ConfigurationError, EngineError, StateMachine, StateMachineBuilder, WakeSource,
};
use std::sync::Arc;
use tracing::{debug, info};

/// State names in which a new configuration is accepted.
pub const CONFIGURABLE_STATES: [&str; 2] = ["Start", "Loaded"];

/// Machine context type of a [`CommandDrivenBinding`].
pub type DeviceMachine<Cfg, K, D> = StateMachine<DeviceContext<Cfg, K, D>>;

/// A device driven by commands.
///
/// Wraps a [`StateMachine`] whose shared context is a [`DeviceContext`].
/// Commands are queued on the context's [`CommandChannel`] and the worker
/// is woken for each of them; configuration may only change while the
/// machine sits in `Start` or `Loaded`.
pub struct CommandDrivenBinding<Cfg, K, D>
where
    Cfg: Clone + Send + 'static,
    K: CommandKind,
    D: HardwareDriver + 'static,
{
    machine: DeviceMachine<Cfg, K, D>,
}

impl<Cfg, K, D> CommandDrivenBinding<Cfg, K, D>
where
    Cfg: Clone + Send + 'static,
    K: CommandKind,
    D: HardwareDriver + 'static,
{
    /// Build the machine described by `builder` around `driver`.
    ///
    /// The command channel is sized by the builder's
    /// `command_queue_depth` and doubles as the machine's wake source.
    pub fn new(
        builder: StateMachineBuilder<DeviceContext<Cfg, K, D>>,
        driver: D,
    ) -> Result<Self, ConfigurationError> {
        let depth = builder.configured_settings().command_queue_depth;
        let commands = Arc::new(CommandChannel::new(depth));
        let wake: Arc<dyn WakeSource> = commands.clone();

        let machine = builder
            .wake_source(wake)
            .build(DeviceContext::new(driver, commands))?;
        Ok(Self { machine })
    }

    pub fn machine(&self) -> &DeviceMachine<Cfg, K, D> {
        &self.machine
    }

    pub fn context(&self) -> &DeviceContext<Cfg, K, D> {
        self.machine.shared()
    }

    pub fn name(&self) -> &str {
        self.machine.name()
    }

    /// Replace the configuration with a copy of `configuration`.
    ///
    /// Only accepted in the states listed in [`CONFIGURABLE_STATES`]. A
    /// parked worker is resumed so it can pick the new configuration up.
    pub fn set_configuration(&self, configuration: &Cfg) -> Result<(), BindingError> {
        let state = self.machine.current_state();
        if !CONFIGURABLE_STATES.iter().any(|name| state.is_named(name)) {
            return Err(BindingError::IncompatibleState {
                state: state.name().to_string(),
            });
        }

        let timeout = self.machine.settings().configuration_lock_timeout_duration();
        let mut slot = self
            .context()
            .configuration
            .try_lock_for(timeout)
            .ok_or(BindingError::ConfigurationLocked { timeout })?;
        *slot = Some(configuration.clone());
        drop(slot);

        info!(machine = %self.name(), state = %state, "Configuration updated");
        self.machine.resume();
        Ok(())
    }

    /// Copy of the current configuration.
    pub fn configuration(&self) -> Result<Option<Cfg>, BindingError> {
        let timeout = self.machine.settings().configuration_lock_timeout_duration();
        self.context()
            .try_configuration(timeout)
            .ok_or(BindingError::ConfigurationLocked { timeout })
    }

    pub fn configuration_is_set(&self) -> bool {
        self.context().configuration_is_set()
    }

    /// Queue a command and wake the worker.
    ///
    /// A refused command is marked `IGNORED` with the reason.
    pub fn enqueue_command(&self, command: &Command<K>) -> Result<(), BindingError> {
        self.context().command_channel().submit(command, false)?;
        self.machine.resume();
        Ok(())
    }

    /// Drop every queued command and the current one, marking them
    /// `IGNORED`. Returns how many were dropped.
    pub fn purge_commands(&self) -> usize {
        let purged = self.context().commands().purge(CommandStatus::IGNORED);
        debug!(machine = %self.name(), purged, "Commands purged");
        purged
    }

    /// Commands waiting in the queue.
    pub fn command_count(&self) -> usize {
        self.context().commands().len()
    }

    pub fn is_open(&self) -> bool {
        self.context().driver().is_open()
    }

    pub fn start(&self) -> Result<(), EngineError> {
        self.machine.start()
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.machine.stop()
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn current_state(&self) -> StateId {
        self.machine.current_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::DriverError;
    use crate::command::QueueError;
    use crate::core::{ExitStatus, State, StateCore, Timing};
    use crate::engine::{EngineSettings, StepContext, WakeReason};
    use std::thread;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct Settings {
        gain: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Ping,
    }

    #[derive(Default)]
    struct FakeDriver {
        open: bool,
    }

    impl HardwareDriver for FakeDriver {
        fn is_open(&self) -> bool {
            self.open
        }

        fn open(&mut self) -> Result<(), DriverError> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<(), DriverError> {
            self.open = false;
            Ok(())
        }
    }

    type Ctx = DeviceContext<Settings, Op, FakeDriver>;

    const LOADED: StateId = StateId::new("Loaded", 20);
    const READY: StateId = StateId::new("Ready", 21);

    struct Loaded {
        core: StateCore,
    }

    impl State<Ctx> for Loaded {
        fn core(&self) -> &StateCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StateCore {
            &mut self.core
        }

        fn process(&mut self, ctx: &StepContext<'_, Ctx>, _wake: WakeReason) {
            if ctx.shared().configuration_is_set() {
                let opened = ctx.shared().driver().open();
                self.set_status(if opened.is_ok() {
                    ExitStatus::Complete
                } else {
                    ExitStatus::Error
                });
            }
        }
    }

    struct Ready {
        core: StateCore,
    }

    impl State<Ctx> for Ready {
        fn core(&self) -> &StateCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StateCore {
            &mut self.core
        }

        fn process(&mut self, ctx: &StepContext<'_, Ctx>, _wake: WakeReason) {
            let commands = ctx.shared().commands();
            while commands.dequeue_next().is_some() {
                commands.succeed_current();
                commands.clear_current();
            }
        }
    }

    fn device(depth: usize) -> CommandDrivenBinding<Settings, Op, FakeDriver> {
        let builder = StateMachine::builder("device")
            .settings(EngineSettings::default().command_queue_depth(depth))
            .state(Loaded {
                core: StateCore::new(LOADED, Timing::Infinite),
            })
            .state(Ready {
                core: StateCore::new(READY, Timing::Infinite),
            })
            .transition(StateId::START, ExitStatus::Complete, LOADED)
            .transition(LOADED, ExitStatus::Complete, READY);
        CommandDrivenBinding::new(builder, FakeDriver::default()).unwrap()
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        for _ in 0..400 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn configuration_is_copied_in_and_out() {
        let device = device(4);
        let mut settings = Settings { gain: 3 };

        device.set_configuration(&settings).unwrap();
        settings.gain = 9;

        assert_eq!(device.configuration().unwrap(), Some(Settings { gain: 3 }));
        assert!(device.configuration_is_set());
    }

    #[test]
    fn configuration_moves_device_out_of_loaded() {
        let device = device(4);
        device.start().unwrap();
        assert!(wait_until(|| device.current_state() == LOADED && device.machine().is_idling()));
        assert!(!device.is_open());

        device.set_configuration(&Settings { gain: 1 }).unwrap();

        assert!(wait_until(|| device.current_state() == READY));
        assert!(device.is_open());
        device.stop().unwrap();
    }

    #[test]
    fn configuration_rejected_outside_configurable_states() {
        let device = device(4);
        device.start().unwrap();
        device.set_configuration(&Settings { gain: 1 }).unwrap();
        assert!(wait_until(|| device.current_state() == READY));

        assert_eq!(
            device.set_configuration(&Settings { gain: 2 }),
            Err(BindingError::IncompatibleState {
                state: "Ready".to_string()
            })
        );
        assert_eq!(device.configuration().unwrap(), Some(Settings { gain: 1 }));
        device.stop().unwrap();
    }

    #[test]
    fn enqueued_commands_are_processed() {
        let device = device(4);
        device.start().unwrap();
        device.set_configuration(&Settings { gain: 1 }).unwrap();
        assert!(wait_until(|| device.current_state() == READY && device.machine().is_idling()));

        let command = Command::new(Op::Ping);
        device.enqueue_command(&command).unwrap();

        assert!(wait_until(|| command.is_success()));
        assert_eq!(device.command_count(), 0);
        device.stop().unwrap();
    }

    #[test]
    fn full_queue_refuses_command() {
        let device = device(1);
        device.enqueue_command(&Command::new(Op::Ping)).unwrap();

        let refused = Command::new(Op::Ping);
        assert_eq!(
            device.enqueue_command(&refused),
            Err(BindingError::Queue(QueueError::AtCapacity { capacity: 1 }))
        );
        assert!(refused.status().contains(CommandStatus::IGNORED));
    }

    #[test]
    fn purge_drops_queued_commands() {
        let device = device(4);
        let commands: Vec<_> = (0..3).map(|_| Command::new(Op::Ping)).collect();
        for command in &commands {
            device.enqueue_command(command).unwrap();
        }

        assert_eq!(device.purge_commands(), 3);
        assert_eq!(device.command_count(), 0);
        assert!(commands.iter().all(|c| c.status() == CommandStatus::IGNORED));
    }
}
