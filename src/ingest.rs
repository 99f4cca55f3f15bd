//! The ingestion entry point.
//!
//! [`IngestSink`] accepts one record at a time. Because [`IngestSink::submit`] takes
//! `&mut self`, a producer cannot hand over the next record before the previous call
//! resolved, which is the backpressure contract: at most one write or flush is ever in
//! flight.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::batch::{self, BatchAccumulator};
use crate::config::{SinkOptions, SinkSettings};
use crate::error::{ConnectionError, SinkError, SinkResult};
use crate::report::{Reporter, RunSummary};
use crate::sink::{Backend, SinkHandle};
use crate::types::{Record, SinkEvent};

/// How a submitted record was handled once its acknowledgement was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Written on its own (direct mode), whether or not the backend accepted it.
    Written,
    /// Added to the pending group.
    Buffered,
    /// Completed the pending group, which was flushed before acknowledging.
    Flushed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Broken,
    Finished,
}

/// Sink persisting records to a [`Backend`], either one by one or in groups.
pub struct IngestSink<B: Backend> {
    settings: SinkSettings,
    backend: B,
    handle: Option<B::Handle>,
    accumulator: Option<BatchAccumulator>,
    reporter: Reporter,
    state: State,
}

impl<B: Backend> IngestSink<B> {
    /// Validates `options` and creates the sink. No connection is made until the first
    /// record is submitted.
    pub fn new(options: SinkOptions, backend: B) -> SinkResult<Self> {
        let settings = SinkSettings::validate(options)?;
        let accumulator = settings.batch().map(BatchAccumulator::new);
        let reporter = Reporter::new(settings.target_label());

        Ok(Self {
            settings,
            backend,
            handle: None,
            accumulator,
            reporter,
            state: State::Open,
        })
    }

    /// Returns a receiver for every notification emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SinkEvent> {
        self.reporter.subscribe()
    }

    /// Persists `record`, connecting first if needed.
    ///
    /// Backend write failures are reported as [`SinkEvent`]s and still acknowledged.
    /// Only a connection failure is returned as an error; the sink is broken after it.
    pub async fn submit(&mut self, record: Record) -> SinkResult<Ack> {
        self.ensure_open()?;

        if self.handle.is_none() {
            self.connect().await?;
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(SinkError::Broken);
        };

        self.reporter.record_received();

        let Some(accumulator) = self.accumulator.as_mut() else {
            let result = handle.insert_one(record).await;
            self.reporter.single_write(result);
            return Ok(Ack::Written);
        };

        if !accumulator.push(record) {
            return Ok(Ack::Buffered);
        }

        debug!("added last grouped insert of current group");
        let mode = accumulator.mode();
        let group = accumulator.take_group();
        batch::flush(handle, group, mode, &mut self.reporter).await;

        Ok(Ack::Flushed)
    }

    /// Signals end of input: flushes the remaining partial group, releases the
    /// backend handle and emits [`SinkEvent::Done`].
    ///
    /// Runs once. Calling it again returns [`SinkError::Finished`], calling it after a
    /// connection failure returns [`SinkError::Broken`].
    pub async fn finish(&mut self) -> SinkResult<RunSummary> {
        self.ensure_open()?;
        self.state = State::Finished;

        if let (Some(handle), Some(accumulator)) = (self.handle.as_mut(), self.accumulator.as_mut())
        {
            if accumulator.op_counter() > 0 {
                debug!("executing remaining grouped inserts");
                let mode = accumulator.mode();
                let group = accumulator.take_group();
                batch::flush(handle, group, mode, &mut self.reporter).await;
            }
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.release().await {
                warn!(error = %err, "failed to release backend handle");
            }
        }

        self.reporter.done();
        info!(
            sink_target = self.settings.target_label(),
            records = self.reporter.summary().records_received,
            "sink done"
        );

        Ok(self.reporter.summary().clone())
    }

    fn ensure_open(&self) -> SinkResult<()> {
        match self.state {
            State::Open => Ok(()),
            State::Broken => Err(SinkError::Broken),
            State::Finished => Err(SinkError::Finished),
        }
    }

    async fn connect(&mut self) -> SinkResult<()> {
        let result = match self.settings.endpoint() {
            Ok(endpoint) => {
                debug!(
                    backend = B::name(),
                    sink_target = endpoint.target,
                    "connecting to backend"
                );
                self.backend
                    .establish(endpoint.uri, self.settings.connection(), endpoint.target)
                    .await
                    .map_err(|source| ConnectionError::Establish {
                        target: endpoint.target.to_string(),
                        source,
                    })
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(handle) => {
                debug!(backend = B::name(), "connected to backend");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.state = State::Broken;
                self.reporter.connection_failed(err.clone());
                Err(err.into())
            }
        }
    }

    /// Settings the sink was validated with.
    #[must_use]
    pub fn settings(&self) -> &SinkSettings {
        &self.settings
    }

    /// Counters for the run so far.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        self.reporter.summary()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of records waiting in the pending group.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.accumulator.as_ref().map_or(0, BatchAccumulator::len)
    }

    /// Records added since the pending group was last reset.
    #[must_use]
    pub fn op_counter(&self) -> usize {
        self.accumulator
            .as_ref()
            .map_or(0, BatchAccumulator::op_counter)
    }
}

impl<B: Backend> fmt::Debug for IngestSink<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestSink")
            .field("backend", &B::name())
            .field("settings", &self.settings)
            .field("connected", &self.handle.is_some())
            .field("pending", &self.pending_len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
