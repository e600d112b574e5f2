//! Decision Policy
//!
//! Maps a frame's detections to a deter / no-deter verdict. The decision is a
//! pure function of the detections and the policy loaded at startup.

mod policy;
mod verdict;

pub use policy::Policy;
pub use verdict::{decide, Verdict};

use thiserror::Error;

/// Policy validation errors
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("Confidence threshold must be within [0, 1], got {0}")]
    Threshold(f32),
    #[error("max_active_ms must be greater than zero")]
    ZeroMaxActive,
    #[error("min_active_ms ({min}) exceeds max_active_ms ({max})")]
    MinExceedsMax { min: u64, max: u64 },
}
