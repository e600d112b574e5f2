//! Transition telemetry

use chrono::{DateTime, Utc};
use decision_policy::Verdict;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::StateNode;

/// Why a transition happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    MotionStart,
    FrameReady,
    CaptureFailed { error: String },
    InferenceFailed { error: String },
    Deter,
    NoDeter,
    MaxActiveElapsed,
    MotionEnded,
    CooldownElapsed,
    SensorFaults { count: u32 },
    ActuatorFault { error: String },
}

/// One state change, as reported to telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub timestamp: DateTime<Utc>,
    pub from: StateNode,
    pub to: StateNode,
    pub reason: TransitionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Decision cycle this transition belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<Uuid>,
}

/// Receiver of transition events. Never feeds back into decisions.
pub trait TelemetrySink: Send {
    fn record(&self, event: &TransitionEvent);
}

/// Writes each transition as a JSON line on the `telemetry` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record(&self, event: &TransitionEvent) {
        match serde_json::to_string(event) {
            Ok(line) => info!(target: "telemetry", "{}", line),
            Err(e) => warn!("Failed to serialize transition: {}", e),
        }
    }
}

impl TelemetrySink for mpsc::UnboundedSender<TransitionEvent> {
    fn record(&self, event: &TransitionEvent) {
        // A dropped receiver only means nobody is listening
        let _ = self.send(event.clone());
    }
}
