//! Outcome routing for a sink.
//!
//! Every write, flush and lifecycle step is reported here: as a [`SinkEvent`] to
//! subscribers, as counters in the [`RunSummary`] and as metrics.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{BackendError, ConnectionError};
use crate::metrics;
use crate::sink::WriteOutcome;
use crate::types::SinkEvent;

/// Counters describing how a sink run proceeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records_received: u64,
    pub single_writes: u64,
    pub write_failures: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    /// Records the backend reported as persisted, including partial group successes.
    pub records_inserted: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Wall-clock time between the first record and completion.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Fans notifications out to every live subscriber.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<mpsc::UnboundedSender<SinkEvent>>,
}

impl Notifier {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Delivers `event` to all subscribers, forgetting the ones that hung up.
    pub fn emit(&mut self, event: SinkEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Debug)]
pub(crate) struct Reporter {
    target: String,
    notifier: Notifier,
    summary: RunSummary,
}

impl Reporter {
    pub(crate) fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            notifier: Notifier::default(),
            summary: RunSummary::default(),
        }
    }

    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SinkEvent> {
        self.notifier.subscribe()
    }

    pub(crate) fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub(crate) fn record_received(&mut self) {
        self.summary.records_received += 1;
        self.summary.started_at.get_or_insert_with(Utc::now);
        metrics::record_records_submitted(&self.target, 1);
    }

    pub(crate) fn connection_failed(&mut self, err: ConnectionError) {
        error!(sink_target = %self.target, error = %err, "sink connection failed");
        self.notifier.emit(SinkEvent::Connection(err));
    }

    pub(crate) fn single_write(&mut self, result: Result<WriteOutcome, BackendError>) {
        self.summary.single_writes += 1;
        metrics::record_single_write(&self.target);

        match result {
            Ok(outcome) => {
                self.inserted(outcome.inserted_count);
                debug!("single insert done");
            }
            Err(err) => {
                self.summary.write_failures += 1;
                self.inserted(err.inserted_count);
                metrics::record_write_failed(&self.target);
                warn!(sink_target = %self.target, error = %err, "single write failed");
                self.notifier.emit(SinkEvent::WriteFailed { error: err });
            }
        }
    }

    pub(crate) fn flush(&mut self, group_size: usize, result: Result<WriteOutcome, BackendError>) {
        self.summary.flushes += 1;
        metrics::record_flush(&self.target, group_size);

        match result {
            Ok(outcome) => {
                self.inserted(outcome.inserted_count);
                debug!(
                    inserted_count = outcome.inserted_count,
                    "correctly inserted group"
                );
            }
            Err(err) => {
                self.summary.flush_failures += 1;
                self.inserted(err.inserted_count);
                metrics::record_flush_failed(&self.target);
                warn!(
                    sink_target = %self.target,
                    group_size,
                    inserted_count = err.inserted_count,
                    error = %err,
                    "group flush failed"
                );
                self.notifier.emit(SinkEvent::FlushFailed {
                    error: err,
                    group_size,
                });
            }
        }
    }

    pub(crate) fn done(&mut self) {
        self.summary.finished_at = Some(Utc::now());
        self.notifier.emit(SinkEvent::Done);
    }

    fn inserted(&mut self, count: u64) {
        self.summary.records_inserted += count;
        metrics::record_records_inserted(&self.target, count);
    }
}
