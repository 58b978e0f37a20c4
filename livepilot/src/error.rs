//! Error types for the live session core.

use livepilot_realtime::RealtimeError;
use thiserror::Error;

/// Result type for live session operations.
pub type Result<T> = std::result::Result<T, LiveError>;

/// Failures acquiring a capture device or audio context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user or platform refused access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No matching device is present.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The platform cannot capture this kind of media at all.
    #[error("Capture not supported: {0}")]
    Unsupported(String),

    /// Any other platform failure.
    #[error("Platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Create a permission error.
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        CaptureError::PermissionDenied(msg.into())
    }

    /// Create a missing-device error.
    pub fn device_unavailable<S: Into<String>>(msg: S) -> Self {
        CaptureError::DeviceUnavailable(msg.into())
    }
}

/// Errors surfaced by the session manager.
#[derive(Error, Debug)]
pub enum LiveError {
    /// Capture acquisition failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The transport failed to open or broke mid-session.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// A still frame could not be encoded.
    #[error("Frame error: {0}")]
    Frame(String),

    /// Invalid manager configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LiveError {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LiveError::Config(msg.into())
    }
}

impl From<image::ImageError> for LiveError {
    fn from(err: image::ImageError) -> Self {
        LiveError::Frame(err.to_string())
    }
}
