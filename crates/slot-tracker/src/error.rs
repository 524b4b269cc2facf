//! Error taxonomy for the monitoring engine.
//!
//! Only [`TrackerError::AuthConfig`] is fatal, and only during startup.
//! Everything else is caught at the task boundary and either dropped
//! silently (auth rejection) or handed to the error reporter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// No source credential configured
    #[error("source credential {0} is not set")]
    AuthConfig(String),

    /// Login exchange did not produce a session credential
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Upstream rejected the session credential
    #[error("session credential rejected")]
    AuthRejected,

    /// Non-success HTTP status
    #[error("request failed with status {0}")]
    Transport(u16),

    /// Upstream answered but flagged the request as failed
    #[error("{0}")]
    Application(String),

    /// Snapshot or throttle state could not be read or written
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Request never produced a response
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TrackerError {
    /// Create a login error with a custom message
    pub fn login_failed(message: impl Into<String>) -> Self {
        TrackerError::LoginFailed(message.into())
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        TrackerError::Persistence(err.to_string())
    }

    /// Whether the process should stop rather than wait for the next cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::AuthConfig(_))
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Persistence(err.to_string())
    }
}

/// Result type alias for engine operations
pub type TrackerResult<T> = Result<T, TrackerError>;
