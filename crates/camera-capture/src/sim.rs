//! Simulated camera

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{CameraError, Frame, FrameSource};

#[derive(Default)]
struct SimState {
    fail_next: usize,
    delay: Duration,
}

/// Camera producing solid frames, with scripted failures and latency.
///
/// Clones share state, so a test can keep a handle after handing the
/// camera to a [`crate::FrameCapture`].
#[derive(Clone)]
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    grabs: Arc<AtomicUsize>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            grabs: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Number of grab attempts so far
    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    /// Fail the next `count` grabs with a stream error
    pub fn fail_next(&self, count: usize) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fail_next = count;
    }

    /// Block every grab for `delay` (exposure / transfer latency)
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).delay = delay;
    }
}

impl FrameSource for SimulatedCamera {
    fn grab(&mut self) -> Result<Frame, CameraError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);

        let (fail, delay) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let fail = state.fail_next > 0;
            if fail {
                state.fail_next -= 1;
            }
            (fail, state.delay)
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if fail {
            return Err(CameraError::Stream("simulated capture failure".into()));
        }
        Ok(Frame::solid(self.width, self.height, [90, 120, 60]))
    }
}
