//! Motion Stage Device
//!
//! This example drives a simulated motorized stage through a
//! command-driven binding.
//!
//! Key concepts:
//! - Declaring state ids with `state_ids!`
//! - Waiting for configuration in `Loaded`
//! - Processing queued commands in a periodic `Ready` state
//! - Command timeouts and status callbacks
//!
//! Run with: cargo run --example motion_stage

use devfsm::binding::{CommandDrivenBinding, DeviceContext, DriverError, HardwareDriver};
use devfsm::command::{Command, CommandStatus};
use devfsm::core::{ExitStatus, State, StateCore, StateId, Timing};
use devfsm::engine::{StateMachine, StepContext, WakeReason};
use devfsm::state_ids;
use std::thread;
use std::time::Duration;

state_ids! {
    struct Stage {
        Loaded = 20,
        Ready = 21,
        Fault = 22,
    }
}

#[derive(Clone, Debug)]
struct StageConfig {
    travel: u32,
}

#[derive(Clone, Debug, PartialEq)]
enum StageOp {
    Home,
    MoveTo,
}

#[derive(Default)]
struct SimulatedStage {
    open: bool,
    position: u32,
}

impl HardwareDriver for SimulatedStage {
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

type Ctx = DeviceContext<StageConfig, StageOp, SimulatedStage>;

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
        if !ctx.shared().configuration_is_set() {
            return;
        }
        let status = match ctx.shared().driver().open() {
            Ok(()) => ExitStatus::Complete,
            Err(_) => ExitStatus::Error,
        };
        self.set_status(status);
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
        let device = ctx.shared();
        let commands = device.commands();
        let Some(command) = commands.dequeue_next() else {
            return;
        };

        let travel = device.configuration().map_or(0, |config| config.travel);
        match command.kind() {
            StageOp::Home => {
                device.driver().position = 0;
                commands.succeed_current();
            }
            StageOp::MoveTo => match command.arguments::<u32>() {
                Some(&target) if target <= travel => {
                    device.driver().position = target;
                    commands.succeed_current();
                }
                Some(target) => {
                    commands.fail_current(format!("{target} is beyond travel {travel}"));
                }
                None => {
                    command.mark_wrong("missing target position");
                }
            },
        }

        let status = ExitStatus::from_command_status(command.status());
        if status == ExitStatus::Error {
            self.set_status(status);
        }
        commands.clear_current();
    }
}

struct Fault {
    core: StateCore,
}

impl State<Ctx> for Fault {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    fn enter(&mut self, ctx: &StepContext<'_, Ctx>) {
        println!("  fault after {:?}", ctx.previous_state());
    }

    fn process(&mut self, ctx: &StepContext<'_, Ctx>, _wake: WakeReason) {
        ctx.shared().commands().purge(CommandStatus::IGNORED);
        self.set_status(ExitStatus::Complete);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Motion Stage Device ===\n");

    let builder = StateMachine::builder("stage")
        .state(Loaded {
            core: StateCore::new(Stage::Loaded, Timing::Infinite),
        })
        .state(Ready {
            core: StateCore::new(Stage::Ready, Timing::periodic(Duration::from_millis(50))),
        })
        .state(Fault {
            core: StateCore::new(Stage::Fault, Timing::Continuous),
        })
        .transition(StateId::START, ExitStatus::Complete, Stage::Loaded)
        .transition(Stage::Loaded, ExitStatus::Complete, Stage::Ready)
        .transition(Stage::Loaded, ExitStatus::Error, Stage::Fault)
        .transition(Stage::Ready, ExitStatus::Error, Stage::Fault)
        .transition(Stage::Fault, ExitStatus::Complete, Stage::Ready);

    let device = CommandDrivenBinding::new(builder, SimulatedStage::default())
        .expect("stage transitions are consistent");

    println!("States: {:?}", Stage::ALL.iter().map(StateId::name).collect::<Vec<_>>());
    device.start().expect("worker thread starts");
    device
        .set_configuration(&StageConfig { travel: 100 })
        .expect("configuration accepted while loaded");

    let commands = [
        Command::builder(StageOp::Home).build(),
        Command::builder(StageOp::MoveTo).arguments(40u32).build(),
        Command::builder(StageOp::MoveTo)
            .arguments(250u32)
            .on_status(|event| println!("  command {} -> {}", event.id, event.status))
            .build(),
        Command::builder(StageOp::MoveTo)
            .arguments(75u32)
            .timeouts_ms(1000, 500)
            .build(),
    ];
    for command in &commands {
        if let Err(e) = device.enqueue_command(command) {
            println!("  not queued: {e}");
        }
    }

    while commands.iter().any(Command::is_active) {
        thread::sleep(Duration::from_millis(10));
    }

    println!("\nResults:");
    for command in &commands {
        println!(
            "  {:?} {:?}: {} {}",
            command.kind(),
            command.arguments::<u32>(),
            command.status(),
            command.failure_reason().unwrap_or_default()
        );
    }
    println!("\nPosition: {}", device.context().driver().position);
    println!("History: {:?}", device.machine().state_history().path());

    device.stop().expect("worker thread stops");
    println!("\n=== Example Complete ===");
}
