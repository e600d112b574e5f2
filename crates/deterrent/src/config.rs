//! Deterrent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buzzer drive pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// Tone held for the whole activation
    #[default]
    Continuous,
    /// Tone switched on and off
    Pulsed { on_ms: u64, off_ms: u64 },
}

/// Deterrent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeterrentConfig {
    /// Drive the buzzer; when false activations are tracked but silent
    pub enabled: bool,
    /// Tone frequency (Hz). 31 kHz for the ultrasonic driver, 6 kHz audible
    pub frequency_hz: u32,
    pub pattern: Pattern,
    /// Hard ceiling on any single activation (ms)
    pub max_active_ms: u64,
}

impl Default for DeterrentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_hz: 31_000,
            pattern: Pattern::Continuous,
            max_active_ms: 10_000,
        }
    }
}

impl DeterrentConfig {
    /// Audible configuration for bench testing
    pub fn bench() -> Self {
        Self {
            frequency_hz: 6_000,
            pattern: Pattern::Pulsed {
                on_ms: 500,
                off_ms: 500,
            },
            ..Default::default()
        }
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_active_ms)
    }
}
