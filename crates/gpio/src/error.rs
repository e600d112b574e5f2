//! GPIO Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or driving a line
#[derive(Debug, Error)]
pub enum GpioError {
    /// Filesystem access to a sysfs attribute failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Attribute contents could not be interpreted
    #[error("Unexpected line value: {0}")]
    Parse(String),

    /// Line is not usable (simulated fault, unexported pin, ...)
    #[error("Line unavailable: {0}")]
    Unavailable(String),
}

impl GpioError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GpioError::Io {
            path: path.into(),
            source,
        }
    }
}
