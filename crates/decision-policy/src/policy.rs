//! Policy configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::PolicyError;

/// Species and timing policy, read-only once loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Labels that trigger the deterrent
    pub deter_species: BTreeSet<String>,
    /// Labels whose presence disarms the deterrent for the cycle
    pub ignore_species: BTreeSet<String>,
    /// Minimum confidence for a detection to count (0.0 to 1.0)
    pub confidence_threshold: f32,
    /// Quiet period after deactivation (ms)
    pub cooldown_ms: u64,
    /// Deterrent on-time ceiling (ms)
    pub max_active_ms: u64,
    /// Deterrent runs at least this long before motion end can stop it (ms)
    pub min_active_ms: u64,
    /// PIR stabilization window (ms)
    pub debounce_ms: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            deter_species: ["cat", "dog", "fox"].iter().map(|s| s.to_string()).collect(),
            ignore_species: BTreeSet::new(),
            confidence_threshold: 0.6,
            cooldown_ms: 30_000,
            max_active_ms: 10_000,
            min_active_ms: 3_000,
            debounce_ms: 50,
        }
    }
}

impl Policy {
    /// Check the policy before the monitor starts
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PolicyError::Threshold(self.confidence_threshold));
        }
        if self.max_active_ms == 0 {
            return Err(PolicyError::ZeroMaxActive);
        }
        if self.min_active_ms > self.max_active_ms {
            return Err(PolicyError::MinExceedsMax {
                min: self.min_active_ms,
                max: self.max_active_ms,
            });
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn max_active(&self) -> Duration {
        Duration::from_millis(self.max_active_ms)
    }

    pub fn min_active(&self) -> Duration {
        Duration::from_millis(self.min_active_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let policy = Policy::default();
        assert!(policy.validate().is_ok());
        assert!(policy.deter_species.contains("fox"));
        assert_eq!(policy.cooldown(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let policy = Policy {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(policy.validate(), Err(PolicyError::Threshold(1.5)));

        let policy = Policy {
            confidence_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_durations() {
        let policy = Policy {
            max_active_ms: 0,
            min_active_ms: 0,
            ..Default::default()
        };
        assert_eq!(policy.validate(), Err(PolicyError::ZeroMaxActive));

        let policy = Policy {
            max_active_ms: 1_000,
            min_active_ms: 2_000,
            ..Default::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::MinExceedsMax { min: 2_000, max: 1_000 })
        );
    }
}
