use std::future::Future;

use serde_json::{Map, Value};

use crate::config::BatchMode;
use crate::error::BackendError;
use crate::types::Record;

/// Successful write reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    pub inserted_count: u64,
}

/// Trait for storage systems records can be persisted to.
///
/// A [`Backend`] only knows how to open a [`SinkHandle`]. The sink calls
/// [`Backend::establish`] lazily, when the first record arrives.
pub trait Backend: Send + Sync {
    type Handle: SinkHandle;

    /// Returns the name of the backend.
    fn name() -> &'static str;

    /// Opens a handle writing to `target`. `options` are passed through untouched.
    fn establish(
        &self,
        uri: &str,
        options: &Map<String, Value>,
        target: &str,
    ) -> impl Future<Output = Result<Self::Handle, BackendError>> + Send;
}

/// Open connection to a single destination.
///
/// A handle is owned by exactly one sink and never used concurrently.
pub trait SinkHandle: Send {
    type Group: WriteGroup;

    /// Writes a single record.
    fn insert_one(
        &mut self,
        record: Record,
    ) -> impl Future<Output = Result<WriteOutcome, BackendError>> + Send;

    /// Starts a grouped write with the given ordering contract.
    fn begin_group(&mut self, mode: BatchMode) -> Self::Group;

    /// Closes the connection.
    fn release(self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Records collected for a single grouped write.
pub trait WriteGroup: Send {
    fn add(&mut self, record: Record);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends all added records as one operation.
    fn execute(self) -> impl Future<Output = Result<WriteOutcome, BackendError>> + Send;
}
