//! Unified error types for RelayClaw.

use thiserror::Error;

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    // Authorization errors
    /// Sender is not an admin. Policy: silent drop, never surfaced to the sender.
    #[error("unauthorized sender: {0}")]
    Unauthorized(i64),

    // Command errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    // Admin management errors
    #[error("cannot remove the last remaining original admin: {0}")]
    LastAdminProtected(i64),

    // Scheduling errors
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    // Transport errors
    #[error("could not resolve '{identifier}': {reason}")]
    Resolution { identifier: String, reason: String },

    #[error("delivery to {destination} failed: {reason}")]
    Delivery { destination: i64, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    // Snapshot errors
    #[error("snapshot error: {0}")]
    Snapshot(String),

    // Config errors
    #[error("configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must never produce a reply to the sender.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::NotFound("payload 7".into());
        assert!(err.to_string().contains("payload 7"));
    }

    #[test]
    fn test_error_constructors() {
        let e1 = RelayError::invalid("bad interval");
        assert!(matches!(e1, RelayError::InvalidArgument(_)));

        let e2 = RelayError::not_found("campaign X");
        assert!(matches!(e2, RelayError::NotFound(_)));

        let e3 = RelayError::transport("timeout");
        assert!(matches!(e3, RelayError::Transport(_)));
    }

    #[test]
    fn test_unauthorized_is_silent() {
        assert!(RelayError::Unauthorized(42).is_silent());
        assert!(!RelayError::invalid("x").is_silent());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
