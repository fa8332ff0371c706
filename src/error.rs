//! Error types for the answer stream.

/// Failure reported by a stream client through its error channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StreamError {
    /// Classify a reqwest failure. Timeouts are kept apart so the controller
    /// can tell the user to retry.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Timeout
        } else {
            StreamError::Transport(err.to_string())
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout)
    }
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt history row: {0}")]
    Corrupt(String),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read stored configuration: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Errors surfaced by the generation controller to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("no previous question to regenerate")]
    NoQuestion,

    #[error("cannot commit while an answer is still generating")]
    CommitWhileGenerating,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("failed to write history: {0}")]
    SinkWrite(#[from] HistoryError),
}
