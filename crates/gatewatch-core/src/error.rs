//! Central error types for the gatewatch pipeline.
//!
//! Every failure crossing a phase boundary is normalized to [`GatewatchError`]
//! with a human-readable message. Only the poll-timeout case is distinguished
//! structurally, so callers can branch on it without string matching.

use thiserror::Error;

/// Central error type for all gatewatch operations.
#[derive(Error, Debug)]
pub enum GatewatchError {
    /// Missing required input, unknown scanner mode, missing prior-phase
    /// state. Fatal: fails the task immediately and is never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure that survived the bounded per-request retry budget
    /// (network blip turned persistent, repeated 5xx).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server reported the analysis task as failed or canceled. Fatal
    /// for that single analysis, but must not abort sibling analyses.
    #[error("analysis task {task_id} finished as {status}: {message}")]
    TaskFailed {
        /// Compute Engine task identifier
        task_id: String,
        /// Terminal status reported by the server (`FAILED` or `CANCELED`)
        status: String,
        /// Server-provided error message, or a placeholder when absent
        message: String,
    },

    /// Poll budget exhausted before the task reached a terminal state.
    /// Recoverable: the analysis is reported as a warning and its section
    /// omitted; the build is not failed because of it.
    #[error("task {task_id} still not complete after {attempts} status polls")]
    Timeout {
        /// Compute Engine task identifier
        task_id: String,
        /// Number of completion polls spent
        attempts: u32,
    },

    /// Task report file is malformed or unreadable. Fatal for that file's
    /// analysis, logged with the offending path.
    #[error("invalid task report {path}: {reason}")]
    Report {
        /// Path of the offending report file
        path: String,
        /// What made the file unusable
        reason: String,
    },

    /// Scanner binary could not be resolved, launched, or exited with a
    /// failure. Fatal for the analyze phase.
    #[error("scanner error: {0}")]
    Scanner(String),

    /// Persisted cross-phase state could not be read or written.
    #[error("state error: {0}")]
    State(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewatchError {
    /// True for the soft poll-timeout outcome, the one failure callers may
    /// swallow into a warning instead of failing the build.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for fatal configuration errors that must never be retried.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using [`GatewatchError`].
pub type Result<T> = std::result::Result<T, GatewatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewatchError::Config("missing server url".to_string());
        assert_eq!(err.to_string(), "configuration error: missing server url");

        let err = GatewatchError::Timeout {
            task_id: "AYhE".to_string(),
            attempts: 60,
        };
        assert_eq!(
            err.to_string(),
            "task AYhE still not complete after 60 status polls"
        );
    }

    #[test]
    fn test_timeout_is_structurally_distinguished() {
        let timeout = GatewatchError::Timeout {
            task_id: "t".to_string(),
            attempts: 1,
        };
        let transport = GatewatchError::Transport("boom".to_string());

        assert!(timeout.is_timeout());
        assert!(!transport.is_timeout());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: GatewatchError = io_err.into();
        assert!(matches!(err, GatewatchError::Io(_)));
    }
}
