use gatewatch_core::GatewatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from scanner dispatch, resolution and invocation.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Mode name not in the closed set. Fatal configuration error, never
    /// a silent no-op.
    #[error("unknown scanner mode '{0}' (expected cli, build or other)")]
    UnknownMode(String),

    /// A mode-required input was not provided
    #[error("scanner mode '{mode}' requires {field}")]
    MissingInput {
        /// The selected mode
        mode: &'static str,
        /// The missing input
        field: &'static str,
    },

    /// An explicitly configured path does not exist
    #[error("configured scanner path {path} does not exist")]
    BinaryNotFound {
        /// The configured path
        path: PathBuf,
    },

    /// Downloading the scanner binary failed
    #[error("failed to download scanner from {url}: {reason}")]
    Download {
        /// Download URL
        url: String,
        /// Failure description
        reason: String,
    },

    /// The scanner process could not be started
    #[error("failed to launch scanner {binary}: {source}")]
    Launch {
        /// Binary that was launched
        binary: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scanner ran but exited with a failure
    #[error("scanner exited with {code_display}, {issue_count} error line(s) reported")]
    ExecutionFailed {
        /// Printable exit code (`code 2` or `signal`)
        code_display: String,
        /// Error lines surfaced from stderr
        issue_count: usize,
    },

    /// Cross-phase state could not be persisted
    #[error("state error: {0}")]
    State(String),

    /// I/O while staging the scanner
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScannerError> for GatewatchError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::UnknownMode(_)
            | ScannerError::MissingInput { .. }
            | ScannerError::BinaryNotFound { .. } => GatewatchError::Config(err.to_string()),
            ScannerError::Download { .. } => GatewatchError::Transport(err.to_string()),
            ScannerError::State(msg) => GatewatchError::State(msg),
            other => GatewatchError::Scanner(other.to_string()),
        }
    }
}

/// Result type alias using [`ScannerError`].
pub type Result<T> = std::result::Result<T, ScannerError>;
