//! Driver errors

use thiserror::Error;

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// A single driver call did not complete
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// Underlying I/O failed (GPIO file, socket, child process)
    #[error("{device}: {message}")]
    Io { device: String, message: String },

    /// The device did not answer in time
    #[error("{device}: timed out")]
    Timeout { device: String },

    /// A reading outside the device's valid range
    #[error("{device}: reading {value:.1} out of range")]
    OutOfRange { device: String, value: f64 },

    /// Audio key not present in the clip map
    #[error("unknown audio clip '{0}'")]
    UnknownClip(String),

    /// Generic failure reported by a driver
    #[error("{0}")]
    Failed(String),
}

impl DriverError {
    pub fn io(device: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            device: device.into(),
            message: err.to_string(),
        }
    }
}
