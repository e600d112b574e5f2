//! Sensor event types

use std::time::Instant;

/// Direction of a debounced motion transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// Line went active (something warm is moving)
    Start,
    /// Line went quiet again
    End,
}

/// A debounced motion transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEvent {
    pub kind: MotionKind,
    /// When the transition was accepted
    pub at: Instant,
}

impl MotionEvent {
    pub fn start() -> Self {
        Self {
            kind: MotionKind::Start,
            at: Instant::now(),
        }
    }

    pub fn end() -> Self {
        Self {
            kind: MotionKind::End,
            at: Instant::now(),
        }
    }
}

/// Failure to read the motion line
#[derive(Debug, Clone)]
pub struct SensorFault {
    pub message: String,
    pub at: Instant,
}

impl SensorFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Instant::now(),
        }
    }
}

/// Everything the sensor path reports to the control loop
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Motion(MotionEvent),
    Fault(SensorFault),
    /// First good read after one or more faults
    Recovered,
}
