use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{Map, Value};

use crate::config::BatchMode;
use crate::error::BackendError;
use crate::sink::memory::{MemoryBackend, MemoryGroup, MemoryHandle};
use crate::sink::{Backend, SinkHandle, WriteGroup, WriteOutcome};
use crate::types::Record;

/// Error code of simulated failures.
pub const SIMULATED_ERROR_CODE: i32 = 1;

#[derive(Debug)]
struct Controls {
    fail_connect: AtomicBool,
    fail_write_on_call: AtomicUsize,
    fail_execute_on_call: AtomicUsize,
    write_calls: AtomicUsize,
    execute_calls: AtomicUsize,
}

fn simulated(what: &str) -> BackendError {
    BackendError::new(format!("simulated {what} failure")).with_code(SIMULATED_ERROR_CODE)
}

/// A backend that can be configured to fail on specific calls.
///
/// Successful calls are forwarded to a [`MemoryBackend`], see [`FailableBackend::memory`].
#[derive(Debug, Clone)]
pub struct FailableBackend {
    memory: MemoryBackend,
    controls: Arc<Controls>,
}

impl Default for FailableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FailableBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: MemoryBackend::new(),
            controls: Arc::new(Controls {
                fail_connect: AtomicBool::new(false),
                fail_write_on_call: AtomicUsize::new(usize::MAX),
                fail_execute_on_call: AtomicUsize::new(usize::MAX),
                write_calls: AtomicUsize::new(0),
                execute_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Makes every connection attempt fail.
    pub fn fail_connect(&self) {
        self.controls.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Fails the Nth single write (0-indexed).
    pub fn fail_write_on_call(&self, n: usize) {
        self.controls.fail_write_on_call.store(n, Ordering::SeqCst);
    }

    /// Fails the Nth group execution (0-indexed). Nothing of that group is persisted.
    pub fn fail_execute_on_call(&self, n: usize) {
        self.controls.fail_execute_on_call.store(n, Ordering::SeqCst);
    }

    pub fn succeed_always(&self) {
        self.controls.fail_connect.store(false, Ordering::SeqCst);
        self.controls
            .fail_write_on_call
            .store(usize::MAX, Ordering::SeqCst);
        self.controls
            .fail_execute_on_call
            .store(usize::MAX, Ordering::SeqCst);
    }

    #[must_use]
    pub fn write_call_count(&self) -> usize {
        self.controls.write_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn execute_call_count(&self) -> usize {
        self.controls.execute_calls.load(Ordering::SeqCst)
    }

    /// The backend successful calls end up in.
    #[must_use]
    pub fn memory(&self) -> &MemoryBackend {
        &self.memory
    }
}

impl Backend for FailableBackend {
    type Handle = FailableHandle;

    fn name() -> &'static str {
        "failable"
    }

    async fn establish(
        &self,
        uri: &str,
        options: &Map<String, Value>,
        target: &str,
    ) -> Result<FailableHandle, BackendError> {
        if self.controls.fail_connect.load(Ordering::SeqCst) {
            return Err(simulated("connect"));
        }

        let inner = self.memory.establish(uri, options, target).await?;
        Ok(FailableHandle {
            inner,
            controls: self.controls.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FailableHandle {
    inner: MemoryHandle,
    controls: Arc<Controls>,
}

impl SinkHandle for FailableHandle {
    type Group = FailableGroup;

    async fn insert_one(&mut self, record: Record) -> Result<WriteOutcome, BackendError> {
        let call_num = self.controls.write_calls.fetch_add(1, Ordering::SeqCst);
        if call_num == self.controls.fail_write_on_call.load(Ordering::SeqCst) {
            return Err(simulated("write"));
        }

        self.inner.insert_one(record).await
    }

    fn begin_group(&mut self, mode: BatchMode) -> FailableGroup {
        FailableGroup {
            inner: self.inner.begin_group(mode),
            controls: self.controls.clone(),
        }
    }

    async fn release(self) -> Result<(), BackendError> {
        self.inner.release().await
    }
}

#[derive(Debug)]
pub struct FailableGroup {
    inner: MemoryGroup,
    controls: Arc<Controls>,
}

impl WriteGroup for FailableGroup {
    fn add(&mut self, record: Record) {
        self.inner.add(record);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    async fn execute(self) -> Result<WriteOutcome, BackendError> {
        let call_num = self.controls.execute_calls.fetch_add(1, Ordering::SeqCst);
        if call_num == self.controls.fail_execute_on_call.load(Ordering::SeqCst) {
            return Err(simulated("execute"));
        }

        self.inner.execute().await
    }
}
