//! Mock detector for tests and model-less bench runs

use camera_capture::Frame;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{Detection, Detector, InferenceError};

/// Detector returning a preset list of detections
#[derive(Clone)]
pub struct MockDetector {
    detections: Vec<Detection>,
    delay: Duration,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            delay: Duration::ZERO,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate model latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with a model failure
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of detect calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for MockDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match &self.failure {
            Some(message) => Err(InferenceError::ModelFailure(message.clone())),
            None => Ok(self.detections.clone()),
        }
    }
}
