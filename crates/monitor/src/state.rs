//! Monitor state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Position in the decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateNode {
    /// Armed, waiting for motion
    #[default]
    Idle,
    Capturing,
    Analyzing,
    /// Buzzer active
    Deterring,
    Cooldown,
    /// Terminal; only a restart leaves it
    Disabled,
}

impl StateNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateNode::Idle => "idle",
            StateNode::Capturing => "capturing",
            StateNode::Analyzing => "analyzing",
            StateNode::Deterring => "deterring",
            StateNode::Cooldown => "cooldown",
            StateNode::Disabled => "disabled",
        }
    }

    /// Whether a decision cycle is in flight
    pub fn in_cycle(&self) -> bool {
        matches!(
            self,
            StateNode::Capturing | StateNode::Analyzing | StateNode::Deterring | StateNode::Cooldown
        )
    }
}

impl fmt::Display for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by the monitor task
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub node: StateNode,
    pub last_transition: Instant,
    /// When the buzzer was last switched on
    pub last_activation: Option<Instant>,
    /// Decision cycles started
    pub cycles: u64,
    /// Motion starts folded into a running cycle
    pub coalesced_events: u64,
    pub consecutive_faults: u32,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            node: StateNode::Idle,
            last_transition: Instant::now(),
            last_activation: None,
            cycles: 0,
            coalesced_events: 0,
            consecutive_faults: 0,
        }
    }
}
