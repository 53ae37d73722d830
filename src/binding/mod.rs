//! Command-driven devices.
//!
//! [`CommandDrivenBinding`] ties a [`StateMachine`](crate::engine::StateMachine)
//! to a configuration object, a [`HardwareDriver`] and a command channel.
//! The states reach all three through [`DeviceContext`].

mod context;
mod device;
mod driver;
mod error;

pub use context::DeviceContext;
pub use device::{CommandDrivenBinding, DeviceMachine, CONFIGURABLE_STATES};
pub use driver::{DriverError, HardwareDriver};
pub use error::BindingError;
