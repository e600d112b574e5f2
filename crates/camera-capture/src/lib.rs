//! Camera Capture Library for the Garden Monitor
//!
//! Acquires single still frames on demand. Each capture is a fresh
//! acquisition bounded by a timeout; nothing is cached between calls.
//! Supports:
//! - External still-capture programs (e.g. `libcamera-still`) emitting JPEG
//! - Directory replay of image files for bench runs
//! - A simulated camera for tests

pub mod capture;
pub mod frame;
pub mod sim;
pub mod source;

pub use capture::{CaptureConfig, FrameCapture};
pub use frame::Frame;
pub use sim::SimulatedCamera;
pub use source::{CommandSource, DirectorySource, FrameSource};

use thiserror::Error;

/// Driver-level camera errors raised by a [`FrameSource`]
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),
}

impl From<image::ImageError> for CameraError {
    fn from(e: image::ImageError) -> Self {
        CameraError::Format(e.to_string())
    }
}

/// Errors returned to the control loop by [`FrameCapture::capture`]
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture timeout after {0}ms")]
    Timeout(u64),

    #[error("Camera device failure: {0}")]
    DeviceFailure(String),
}

impl From<CameraError> for CaptureError {
    fn from(e: CameraError) -> Self {
        CaptureError::DeviceFailure(e.to_string())
    }
}
