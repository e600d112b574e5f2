//! ONNX Inference Engine
//!
//! Runs a fixed-weights object detector over captured stills and returns
//! labelled, scored bounding boxes. Inference is bounded by a timeout and
//! never blocks the control loop.

mod detection;
mod engine;
mod labels;
mod mock;
mod onnx;

pub use detection::{BoundingBox, Detection};
pub use engine::{Detector, EngineConfig, InferenceEngine};
pub use labels::LabelMap;
pub use mock::MockDetector;
pub use onnx::{decode_ssd_outputs, ModelConfig, OnnxDetector};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    ModelFailure(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),
    #[error("Detector still busy with a timed-out frame")]
    Busy,
}
