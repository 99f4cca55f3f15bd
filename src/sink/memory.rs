use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BatchMode;
use crate::error::BackendError;
use crate::sink::{Backend, SinkHandle, WriteGroup, WriteOutcome};
use crate::types::Record;

/// Error code reported when a record violates a unique key.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// URI scheme accepted by [`MemoryBackend::establish`].
const URI_SCHEME: &str = "memory://";

/// Primary key field, assigned when a record does not carry one.
const ID_FIELD: &str = "_id";

/// A grouped write as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCall {
    pub mode: BatchMode,
    pub size: usize,
}

#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
    ids: HashSet<String>,
    unique_values: HashSet<String>,
}

impl Collection {
    fn insert(&mut self, mut record: Record, unique_key: Option<&str>) -> Result<(), BackendError> {
        let id = record
            .entry(ID_FIELD)
            .or_insert_with(|| Value::from(Uuid::new_v4().to_string()))
            .to_string();
        if self.ids.contains(&id) {
            return Err(duplicate_key(ID_FIELD, &id));
        }

        let unique_value = unique_key.and_then(|key| record.get(key).map(|v| (key, v.to_string())));
        if let Some((key, value)) = &unique_value {
            if self.unique_values.contains(value) {
                return Err(duplicate_key(key, value));
            }
        }

        self.ids.insert(id);
        if let Some((_, value)) = unique_value {
            self.unique_values.insert(value);
        }
        self.records.push(record);

        Ok(())
    }
}

fn duplicate_key(key: &str, value: &str) -> BackendError {
    BackendError::new(format!("duplicate key error: {key} = {value}")).with_code(DUPLICATE_KEY_CODE)
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Collection>,
    connects: usize,
    releases: usize,
    single_writes: usize,
    groups: Vec<GroupCall>,
}

/// In-memory backend for testing and development purposes.
///
/// [`MemoryBackend`] keeps every target in a map of collections, enforces uniqueness
/// of `_id` and of an optional configured key, and records how it was called.
/// All data is held in memory and will be lost when the process terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    unique_key: Option<String>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that also rejects duplicate values of `unique_key`.
    #[must_use]
    pub fn with_unique_key(unique_key: impl Into<String>) -> Self {
        Self {
            unique_key: Some(unique_key.into()),
            ..Self::default()
        }
    }

    /// Returns a copy of the records persisted to `target`.
    pub async fn records(&self, target: &str) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .collections
            .get(target)
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }

    pub async fn count(&self, target: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.collections.get(target).map_or(0, |c| c.records.len())
    }

    pub async fn connect_count(&self) -> usize {
        self.inner.lock().await.connects
    }

    pub async fn release_count(&self) -> usize {
        self.inner.lock().await.releases
    }

    pub async fn single_write_count(&self) -> usize {
        self.inner.lock().await.single_writes
    }

    /// Returns every grouped write executed so far, in execution order.
    pub async fn group_calls(&self) -> Vec<GroupCall> {
        self.inner.lock().await.groups.clone()
    }

    /// Drops all stored records and call statistics.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        *inner = Inner::default();
    }
}

impl Backend for MemoryBackend {
    type Handle = MemoryHandle;

    fn name() -> &'static str {
        "memory"
    }

    async fn establish(
        &self,
        uri: &str,
        options: &Map<String, Value>,
        target: &str,
    ) -> Result<MemoryHandle, BackendError> {
        if !uri.starts_with(URI_SCHEME) {
            return Err(BackendError::new(format!(
                "unsupported connection uri, expected a `{URI_SCHEME}` uri"
            )));
        }

        let mut inner = self.inner.lock().await;
        inner.connects += 1;
        inner.collections.entry(target.to_string()).or_default();

        debug!(collection = target, options = options.len(), "memory backend connected");

        Ok(MemoryHandle {
            inner: self.inner.clone(),
            target: target.to_string(),
            unique_key: self.unique_key.clone(),
        })
    }
}

/// Handle to one target of a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryHandle {
    inner: Arc<Mutex<Inner>>,
    target: String,
    unique_key: Option<String>,
}

impl SinkHandle for MemoryHandle {
    type Group = MemoryGroup;

    async fn insert_one(&mut self, record: Record) -> Result<WriteOutcome, BackendError> {
        let mut inner = self.inner.lock().await;
        inner.single_writes += 1;

        inner
            .collections
            .entry(self.target.clone())
            .or_default()
            .insert(record, self.unique_key.as_deref())?;

        Ok(WriteOutcome { inserted_count: 1 })
    }

    fn begin_group(&mut self, mode: BatchMode) -> MemoryGroup {
        MemoryGroup {
            inner: self.inner.clone(),
            target: self.target.clone(),
            unique_key: self.unique_key.clone(),
            mode,
            records: Vec::new(),
        }
    }

    async fn release(self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        inner.releases += 1;
        Ok(())
    }
}

/// Pending grouped write against a [`MemoryBackend`].
///
/// Ordered groups stop at the first failing record. Unordered groups attempt every
/// record and report the failures together.
#[derive(Debug)]
pub struct MemoryGroup {
    inner: Arc<Mutex<Inner>>,
    target: String,
    unique_key: Option<String>,
    mode: BatchMode,
    records: Vec<Record>,
}

impl WriteGroup for MemoryGroup {
    fn add(&mut self, record: Record) {
        self.records.push(record);
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    async fn execute(self) -> Result<WriteOutcome, BackendError> {
        let MemoryGroup {
            inner,
            target,
            unique_key,
            mode,
            records,
        } = self;

        let mut inner = inner.lock().await;
        let total = records.len();
        inner.groups.push(GroupCall { mode, size: total });

        info!("writing a group of {} records to {}", total, target);

        let collection = inner.collections.entry(target).or_default();
        let mut inserted_count = 0;
        let mut failures = Vec::new();

        for record in records {
            match collection.insert(record, unique_key.as_deref()) {
                Ok(()) => inserted_count += 1,
                Err(err) => {
                    failures.push(err);
                    if mode == BatchMode::Ordered {
                        break;
                    }
                }
            }
        }

        match failures.first() {
            None => Ok(WriteOutcome { inserted_count }),
            Some(first) => Err(BackendError {
                code: first.code,
                message: format!(
                    "{} of {} writes failed, first: {}",
                    failures.len(),
                    total,
                    first.message
                ),
                inserted_count,
            }),
        }
    }
}
