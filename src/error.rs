//! Error types for the sink.
//!
//! Only [`ConfigError`] and [`ConnectionError`] break the pipeline. A [`BackendError`]
//! raised by a single write or a grouped flush is contained and surfaced as a
//! [`crate::types::SinkEvent`] instead.

use std::io;

use thiserror::Error;
use tokio::task::JoinError;

/// Result alias used by the ingestion entry points.
pub type SinkResult<T> = Result<T, SinkError>;

/// Classification shared by construction errors and runtime notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Malformed batch options, raised at construction.
    FatalConfig,
    /// Missing connection options or a failed connection, raised at the first record.
    Connection,
    /// A single-record write was rejected by the backend.
    WriteFailed,
    /// A grouped write was rejected by the backend.
    FlushFailed,
    /// The sink drained and released its handle.
    Done,
}

impl EventKind {
    /// Returns `true` for kinds that halt the pipeline.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, EventKind::FatalConfig | EventKind::Connection)
    }
}

/// Invalid construction options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("option `batch.mode` must be \"ordered\" or \"unordered\", got `{0}`")]
    InvalidBatchMode(String),

    #[error("option `batch.buffer_size` must be a number greater than 0, got `{0}`")]
    InvalidBufferSize(String),
}

/// Failure to reach the backend, detected when the first record arrives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("option `target` must be a non-empty string")]
    MissingTarget,

    #[error("option `uri` must be a non-empty string")]
    MissingUri,

    #[error("failed to connect to backend for target `{target}`")]
    Establish {
        target: String,
        #[source]
        source: BackendError,
    },
}

/// Error reported by the storage backend for a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend error (code {code:?}): {message}")]
pub struct BackendError {
    /// Backend specific error code, e.g. a duplicate key code.
    pub code: Option<i32>,
    pub message: String,
    /// Records the backend did persist before or despite the failure.
    pub inserted_count: u64,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            inserted_count: 0,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_inserted_count(mut self, inserted_count: u64) -> Self {
        self.inserted_count = inserted_count;
        self
    }
}

/// Pipeline-breaking error returned by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The sink failed to connect earlier and accepts no further records.
    #[error("sink is broken after a connection failure and accepts no further records")]
    Broken,

    /// The sink already drained and released its handle.
    #[error("sink is finished and accepts no further records")]
    Finished,
}

impl SinkError {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            SinkError::Config(_) => EventKind::FatalConfig,
            SinkError::Connection(_) | SinkError::Broken => EventKind::Connection,
            SinkError::Finished => EventKind::Done,
        }
    }
}

/// Errors raised by the daemon around the sink: input, signals and the sink itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sink failed")]
    Sink(#[from] SinkError),

    #[error("failed to read input")]
    Input(#[source] io::Error),

    #[error("failed to register shutdown signal handler")]
    Signal(#[source] io::Error),

    #[error("sink task panicked or was cancelled")]
    SinkTask(#[from] JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(EventKind::FatalConfig.is_fatal());
        assert!(EventKind::Connection.is_fatal());
        assert!(!EventKind::WriteFailed.is_fatal());
        assert!(!EventKind::FlushFailed.is_fatal());
        assert!(!EventKind::Done.is_fatal());
    }

    #[test]
    fn test_sink_error_kind() {
        let config: SinkError = ConfigError::InvalidBatchMode("fast".into()).into();
        assert_eq!(config.kind(), EventKind::FatalConfig);

        let connection: SinkError = ConnectionError::MissingUri.into();
        assert_eq!(connection.kind(), EventKind::Connection);
        assert_eq!(connection.to_string(), "option `uri` must be a non-empty string");
    }

    #[test]
    fn test_reuse_after_finish_is_not_fatal() {
        assert_eq!(SinkError::Broken.kind(), EventKind::Connection);
        assert!(SinkError::Broken.kind().is_fatal());

        assert_eq!(SinkError::Finished.kind(), EventKind::Done);
        assert!(!SinkError::Finished.kind().is_fatal());
    }

    #[test]
    fn test_backend_error_builder() {
        let err = BackendError::new("duplicate key")
            .with_code(11000)
            .with_inserted_count(3);
        assert_eq!(err.code, Some(11000));
        assert_eq!(err.inserted_count, 3);
        assert_eq!(
            err.to_string(),
            "backend error (code Some(11000)): duplicate key"
        );
    }
}
