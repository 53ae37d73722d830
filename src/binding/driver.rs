//! Hardware driver collaborator.

use thiserror::Error;

/// Failure reported by a hardware driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Minimal surface of a device driver.
///
/// Device-specific reads and writes live on the concrete driver type and
/// are called from state processing steps only. Every call must bound its
/// own latency; the engine cannot interrupt a blocked driver.
pub trait HardwareDriver: Send {
    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<(), DriverError>;

    fn close(&mut self) -> Result<(), DriverError>;
}
