//! PIR Sensor Monitor
//!
//! Watches the passive-infrared motion line on a dedicated thread:
//! - Debounces the raw level against a stabilization window
//! - Invokes motion start/end callbacks once per qualifying transition
//! - Reports read faults instead of stalling
//!
//! The sensor path never captures, infers or actuates. It only publishes
//! [`SensorEvent`]s into a [`SensorInbox`] for the control loop.

mod debounce;
mod event;
mod inbox;
mod monitor;

pub use debounce::Debouncer;
pub use event::{MotionEvent, MotionKind, SensorEvent, SensorFault};
pub use inbox::{sensor_channel, MotionLatch, SensorEvents, SensorInbox};
pub use monitor::{SensorConfig, SensorHandle, SensorMonitor};

use thiserror::Error;

/// Sensor monitor errors
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Failed to drive PIR enable line: {0}")]
    Enable(#[from] gpio::GpioError),

    #[error("Failed to spawn sensor thread: {0}")]
    Spawn(#[from] std::io::Error),
}
