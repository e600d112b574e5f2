//! Inference Engine Implementation

use camera_capture::Frame;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{Detection, InferenceError};

/// Object detector capability.
///
/// Implementations hold fixed weights and keep no state between calls.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError>;
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worst-case inference latency before giving up (ms)
    pub timeout_ms: u64,
    /// Labels passed on to the policy; empty keeps everything
    pub valid_labels: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            valid_labels: Vec::new(),
        }
    }
}

/// Clears the busy flag when the blocking job ends, even by panic
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Timeout-bounded wrapper around a [`Detector`]
pub struct InferenceEngine {
    detector: Arc<dyn Detector>,
    timeout: Duration,
    valid_labels: HashSet<String>,
    busy: Arc<AtomicBool>,
}

impl InferenceEngine {
    /// Create a new inference engine
    pub fn new(detector: Arc<dyn Detector>, config: &EngineConfig) -> Self {
        info!(
            "Creating inference engine: timeout={}ms, label filter={:?}",
            config.timeout_ms, config.valid_labels
        );
        Self {
            detector,
            timeout: Duration::from_millis(config.timeout_ms),
            valid_labels: config.valid_labels.iter().cloned().collect(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run detection on a frame, consuming it.
    ///
    /// The frame is dropped as soon as the detector returns.
    pub async fn infer(&self, frame: Frame) -> Result<Vec<Detection>, InferenceError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            warn!("Inference requested while a timed-out run is still going");
            return Err(InferenceError::Busy);
        }

        let start = Instant::now();
        let detector = self.detector.clone();
        let guard = BusyGuard(self.busy.clone());
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            detector.detect(&frame)
        });

        let timeout_ms = self.timeout.as_millis() as u64;
        let detections = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!("Inference timed out after {}ms", timeout_ms);
                return Err(InferenceError::Timeout(timeout_ms));
            }
            Ok(Err(e)) => {
                return Err(InferenceError::ModelFailure(format!("inference task failed: {}", e)));
            }
            Ok(Ok(result)) => result?,
        };

        let total = detections.len();
        let detections: Vec<Detection> = if self.valid_labels.is_empty() {
            detections
        } else {
            detections
                .into_iter()
                .filter(|d| self.valid_labels.contains(&d.label))
                .collect()
        };

        debug!(
            "Inference completed in {}ms: {} detections ({} after label filter)",
            start.elapsed().as_millis(),
            total,
            detections.len()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, MockDetector};

    fn frame() -> Frame {
        Frame::solid(4, 4, [0, 0, 0])
    }

    fn detections() -> Vec<Detection> {
        vec![
            Detection::new("cat", 0.9, BoundingBox::default()),
            Detection::new("scissors", 0.7, BoundingBox::default()),
            Detection::new("fox", 0.8, BoundingBox::default()),
        ]
    }

    #[tokio::test]
    async fn test_detections_in_model_order() {
        let detector = MockDetector::new(detections());
        let engine = InferenceEngine::new(Arc::new(detector.clone()), &EngineConfig::default());

        let result = engine.infer(frame()).await.unwrap();
        let labels: Vec<_> = result.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["cat", "scissors", "fox"]);
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test]
    async fn test_label_filter() {
        let config = EngineConfig {
            valid_labels: vec!["cat".into(), "fox".into()],
            ..Default::default()
        };
        let engine = InferenceEngine::new(Arc::new(MockDetector::new(detections())), &config);

        let result = engine.infer(frame()).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|d| d.label != "scissors"));
    }

    #[tokio::test]
    async fn test_timeout_then_busy_then_ready() {
        let detector = MockDetector::new(detections()).with_delay(Duration::from_millis(150));
        let config = EngineConfig {
            timeout_ms: 20,
            ..Default::default()
        };
        let engine = InferenceEngine::new(Arc::new(detector.clone()), &config);

        assert!(matches!(engine.infer(frame()).await, Err(InferenceError::Timeout(20))));
        assert!(matches!(engine.infer(frame()).await, Err(InferenceError::Busy)));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!engine.busy.load(Ordering::SeqCst));
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let detector = MockDetector::new(vec![]).failing("tensor arena exhausted");
        let engine = InferenceEngine::new(Arc::new(detector), &EngineConfig::default());

        assert!(matches!(
            engine.infer(frame()).await,
            Err(InferenceError::ModelFailure(_))
        ));
        // A failed run does not leave the engine busy
        assert!(!engine.busy.load(Ordering::SeqCst));
    }
}
