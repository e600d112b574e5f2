//! Timeout-bounded frame capture

use gpio::OutputLine;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{CaptureError, Frame, FrameSource};

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum time to wait for a frame (ms)
    pub timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

type SharedLine = Arc<Mutex<Box<dyn OutputLine>>>;

/// On-demand still capture
pub struct FrameCapture {
    source: Arc<tokio::sync::Mutex<Box<dyn FrameSource>>>,
    illuminator: Option<SharedLine>,
    timeout: Duration,
    sequence: AtomicU32,
}

impl FrameCapture {
    pub fn new(source: Box<dyn FrameSource>, config: &CaptureConfig) -> Self {
        Self {
            source: Arc::new(tokio::sync::Mutex::new(source)),
            illuminator: None,
            timeout: Duration::from_millis(config.timeout_ms),
            sequence: AtomicU32::new(0),
        }
    }

    /// Switch an IR illuminator on for the duration of each grab
    pub fn with_illuminator(mut self, line: Box<dyn OutputLine>) -> Self {
        self.illuminator = Some(Arc::new(Mutex::new(line)));
        self
    }

    /// Acquire one fresh frame.
    ///
    /// A grab still stuck after an earlier timeout makes this fail fast
    /// rather than queue behind it.
    pub async fn capture(&self) -> Result<Frame, CaptureError> {
        let mut source = self
            .source
            .clone()
            .try_lock_owned()
            .map_err(|_| CaptureError::DeviceFailure("camera busy with a previous capture".into()))?;

        let illuminator = self.illuminator.clone();
        let task = tokio::task::spawn_blocking(move || {
            set_illuminator(illuminator.as_ref(), true);
            let result = source.grab();
            set_illuminator(illuminator.as_ref(), false);
            result
        });

        let timeout_ms = self.timeout.as_millis() as u64;
        let mut frame = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!("Capture timed out after {}ms", timeout_ms);
                return Err(CaptureError::Timeout(timeout_ms));
            }
            Ok(Err(e)) => {
                return Err(CaptureError::DeviceFailure(format!("capture task failed: {}", e)));
            }
            Ok(Ok(result)) => result?,
        };

        frame.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Captured frame #{} ({}x{})",
            frame.sequence, frame.width, frame.height
        );
        Ok(frame)
    }
}

fn set_illuminator(line: Option<&SharedLine>, on: bool) {
    if let Some(line) = line {
        let mut line = line.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = line.write(on) {
            warn!("Failed to switch IR illuminator {}: {}", if on { "on" } else { "off" }, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandSource, SimulatedCamera};
    use gpio::SimulatedOutput;

    fn config(timeout_ms: u64) -> CaptureConfig {
        CaptureConfig { timeout_ms }
    }

    #[tokio::test]
    async fn test_fresh_capture_each_call() {
        let camera = SimulatedCamera::new(8, 6);
        let capture = FrameCapture::new(Box::new(camera.clone()), &config(1000));

        let first = capture.capture().await.unwrap();
        let second = capture.capture().await.unwrap();

        assert_eq!(camera.grabs(), 2);
        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
    }

    #[tokio::test]
    async fn test_device_failure_is_reported() {
        let camera = SimulatedCamera::new(8, 6);
        camera.fail_next(1);
        let capture = FrameCapture::new(Box::new(camera.clone()), &config(1000));

        assert!(matches!(
            capture.capture().await,
            Err(CaptureError::DeviceFailure(_))
        ));
        assert!(capture.capture().await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_then_busy() {
        let camera = SimulatedCamera::new(8, 6);
        camera.set_delay(Duration::from_millis(300));
        let capture = FrameCapture::new(Box::new(camera.clone()), &config(20));

        assert!(matches!(capture.capture().await, Err(CaptureError::Timeout(20))));
        // The stuck grab still owns the camera
        assert!(matches!(
            capture.capture().await,
            Err(CaptureError::DeviceFailure(_))
        ));
        assert_eq!(camera.grabs(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_releases_camera() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(150),
        );
        let capture = FrameCapture::new(Box::new(source), &config(100));

        assert!(matches!(capture.capture().await, Err(CaptureError::Timeout(100))));
        tokio::time::sleep(Duration::from_millis(500)).await;
        // The child was killed, so the retry runs instead of reporting busy
        assert!(matches!(capture.capture().await, Err(CaptureError::Timeout(100))));
    }

    #[tokio::test]
    async fn test_illuminator_wraps_grab() {
        let camera = SimulatedCamera::new(8, 6);
        let ir = SimulatedOutput::new();
        let capture = FrameCapture::new(Box::new(camera), &config(1000))
            .with_illuminator(Box::new(ir.clone()));

        capture.capture().await.unwrap();
        assert_eq!(ir.history(), vec![true, false]);
    }
}
