//! Record grouping for batch mode.

use std::mem;

use tracing::debug;

use crate::config::{BatchConfig, BatchMode};
use crate::report::Reporter;
use crate::sink::{SinkHandle, WriteGroup};
use crate::types::Record;

/// Pending group of records plus the counter that detects the buffer-size boundary.
///
/// The group length never exceeds the configured buffer size: the record that reaches
/// the boundary is part of the group handed out by [`BatchAccumulator::take_group`].
#[derive(Debug)]
pub struct BatchAccumulator {
    config: BatchConfig,
    pending: Vec<Record>,
    op_counter: usize,
}

impl BatchAccumulator {
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            op_counter: 0,
        }
    }

    /// Appends `record` and returns `true` when the group is due for a flush.
    pub fn push(&mut self, record: Record) -> bool {
        self.op_counter += 1;
        self.pending.push(record);
        debug!("added grouped insert");

        self.op_counter % self.config.buffer_size.get() == 0
    }

    /// Hands out the pending group, resetting group and counter together.
    pub fn take_group(&mut self) -> Vec<Record> {
        self.op_counter = 0;
        mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn mode(&self) -> BatchMode {
        self.config.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn op_counter(&self) -> usize {
        self.op_counter
    }
}

/// Sends `records` as one grouped write and routes the outcome to `reporter`.
///
/// A failed flush is reported and dropped: records of the group are not retried.
pub(crate) async fn flush<H>(
    handle: &mut H,
    records: Vec<Record>,
    mode: BatchMode,
    reporter: &mut Reporter,
) where
    H: SinkHandle,
{
    let mut group = handle.begin_group(mode);
    for record in records {
        group.add(record);
    }

    let group_size = group.len();
    debug!(group_size, %mode, "executing grouped inserts");

    let result = group.execute().await;
    reporter.flush(group_size, result);
}
