use crate::error::{BackendError, ConnectionError, EventKind};

/// Notification emitted by a sink to its subscribers.
///
/// [`SinkEvent::Connection`] accompanies a pipeline-breaking error. Write and flush
/// failures are contained: ingestion continues after them.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// The backend could not be reached when the first record arrived.
    Connection(ConnectionError),

    /// A single-record write failed (direct mode only).
    WriteFailed { error: BackendError },

    /// A grouped write failed (batch mode only).
    FlushFailed {
        error: BackendError,
        /// Number of records in the affected group.
        group_size: usize,
    },

    /// The sink drained its pending group and released the backend handle.
    Done,
}

impl SinkEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            SinkEvent::Connection(_) => EventKind::Connection,
            SinkEvent::WriteFailed { .. } => EventKind::WriteFailed,
            SinkEvent::FlushFailed { .. } => EventKind::FlushFailed,
            SinkEvent::Done => EventKind::Done,
        }
    }
}
