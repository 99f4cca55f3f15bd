//! Adapters wiring flow-controlled producers to a sink.

use std::future::Future;
use std::pin::pin;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SinkResult;
use crate::ingest::{Ack, IngestSink};
use crate::report::RunSummary;
use crate::sink::Backend;
use crate::types::Record;

/// Capability of receiving records one at a time with acknowledgement.
///
/// A producer must await [`RecordSink::accept`] before offering the next record and
/// call [`RecordSink::end_of_input`] once, after the last one.
pub trait RecordSink {
    fn accept(&mut self, record: Record) -> impl Future<Output = SinkResult<Ack>> + Send;

    fn end_of_input(&mut self) -> impl Future<Output = SinkResult<RunSummary>> + Send;
}

impl<B: Backend> RecordSink for IngestSink<B> {
    async fn accept(&mut self, record: Record) -> SinkResult<Ack> {
        self.submit(record).await
    }

    async fn end_of_input(&mut self) -> SinkResult<RunSummary> {
        self.finish().await
    }
}

/// Drains `records` into `sink`, pulling the next record only after the previous one
/// was acknowledged, then signals end of input.
///
/// Stops at the first pipeline-breaking error without draining the rest of the stream.
pub async fn pipe<S, R>(records: S, sink: &mut R) -> SinkResult<RunSummary>
where
    S: Stream<Item = Record>,
    R: RecordSink,
{
    let mut records = pin!(records);
    while let Some(record) = records.next().await {
        sink.accept(record).await?;
    }

    sink.end_of_input().await
}

/// Runs `sink` on its own task, fed through a bounded channel.
///
/// `capacity` is how many records a producer may queue ahead of the sink before
/// [`mpsc::Sender::send`] waits. Dropping every sender signals end of input; the join
/// handle resolves to the run summary. After a connection failure the receiver is
/// closed and further sends fail.
pub fn spawn_sink<R>(
    mut sink: R,
    capacity: usize,
) -> (mpsc::Sender<Record>, JoinHandle<SinkResult<RunSummary>>)
where
    R: RecordSink + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if let Err(err) = sink.accept(record).await {
                rx.close();
                return Err(err);
            }
        }

        debug!("all record senders dropped, finishing sink");
        sink.end_of_input().await
    });

    (tx, handle)
}
