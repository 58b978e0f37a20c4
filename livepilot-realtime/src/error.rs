//! Error types for the realtime transport.

use thiserror::Error;

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur while talking to a live-session service.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// The session could not be opened.
    #[error("WebSocket connection error: {0}")]
    ConnectionError(String),

    /// The transport failed after the session was open.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A message could not be built or understood.
    #[error("WebSocket message error: {0}")]
    MessageError(String),

    /// Session not connected.
    #[error("Session not connected")]
    NotConnected,

    /// Session already closed.
    #[error("Session already closed")]
    SessionClosed,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed audio payload.
    #[error("Audio format error: {0}")]
    AudioFormatError(String),

    /// Timeout waiting for the server.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid base64 payload.
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl RealtimeError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new mid-session transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::MessageError(msg.into())
    }

    /// Create a new audio format error.
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::AudioFormatError(msg.into())
    }

    /// Whether this error means the session is gone and must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_)
                | Self::TransportError(_)
                | Self::NotConnected
                | Self::SessionClosed
        )
    }
}
