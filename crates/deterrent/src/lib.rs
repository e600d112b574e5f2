//! Deterrent Controller
//!
//! Drives the buzzer for a bounded time. Each activation spawns a watchdog
//! task that owns the pulse timing and silences the line at the deadline on
//! its own, whatever the caller does afterwards.

mod config;
mod controller;

pub use config::{DeterrentConfig, Pattern};
pub use controller::DeterrentController;

use gpio::GpioError;
use thiserror::Error;

/// Failure driving the buzzer line
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Actuator fault: {0}")]
pub struct ActuatorFault(pub String);

impl From<GpioError> for ActuatorFault {
    fn from(e: GpioError) -> Self {
        ActuatorFault(e.to_string())
    }
}
