//! Garden Monitor State Machine
//!
//! Coordinates one decision cycle at a time:
//! motion start, fresh capture, species inference, policy verdict,
//! bounded deterrence, cooldown, re-arm.
//!
//! Motion arriving mid-cycle is coalesced into the running cycle. Persistent
//! sensor faults or a buzzer fault park the monitor in `Disabled` until restart.

mod machine;
mod state;
mod telemetry;

pub use machine::{MonitorConfig, MonitorParts, MonitorStateMachine};
pub use state::{MonitorState, StateNode};
pub use telemetry::{LogTelemetry, TelemetrySink, TransitionEvent, TransitionReason};

use thiserror::Error;

/// Monitor construction errors
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid policy: {0}")]
    Policy(#[from] decision_policy::PolicyError),
}
