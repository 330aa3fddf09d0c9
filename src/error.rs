use thiserror::Error;

/// Ride tracker error types
///
/// Every variant is recoverable: the session state is left untouched when one
/// is returned, so interactive callers may simply ignore it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not running")]
    NotRunning,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Engine closed: {0}")]
    EngineClosed(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
