//! Core daemon logic.
//!
//! Reads newline-delimited JSON records, feeds them through an [`IngestSink`] and
//! drains the sink on end of input or on a shutdown signal.

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::{BackendConfig, InputConfig, InputSource, PipelineConfig},
    error::PipelineError,
    ingest::IngestSink,
    pipeline::{RecordSink, spawn_sink},
    report::RunSummary,
    sink::memory::MemoryBackend,
    types::{SinkEvent, parse_record},
};

/// Starts the pipeline with the provided configuration and runs it to completion.
///
/// Returns the summary of the run. Write and flush failures do not fail the run; they
/// are logged as they happen.
pub async fn start_pipeline_with_config(
    config: PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    info!("starting bulksink pipeline");

    log_config(&config);

    let backend = match &config.backend {
        BackendConfig::Memory { unique_key } => match unique_key {
            Some(key) => MemoryBackend::with_unique_key(key.clone()),
            None => MemoryBackend::new(),
        },
    };

    let mut sink = IngestSink::new(config.sink.clone(), backend)?;
    let events = tokio::spawn(log_events(sink.subscribe()));

    let result = match open_input(&config.input.source).await {
        Ok(reader) => run_with_shutdown(reader, sink, config.input.channel_capacity).await,
        Err(err) => {
            drop(sink);
            Err(err)
        }
    };

    // The event task ends once the sink, and with it every sender, is dropped.
    join_logged(events, "event logger").await;

    let summary = result?;
    info!(
        records_received = summary.records_received,
        records_inserted = summary.records_inserted,
        write_failures = summary.write_failures,
        flush_failures = summary.flush_failures,
        "bulksink pipeline completed"
    );

    Ok(summary)
}

/// Listens for SIGINT and SIGTERM for the whole run.
///
/// Both handlers are installed when this is created, so a signal delivered at any later
/// point, including while the producer is held back by the sink, is not lost.
struct Shutdown {
    sigint: Signal,
    sigterm: Signal,
}

impl Shutdown {
    fn install() -> Result<Self, PipelineError> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt()).map_err(PipelineError::Signal)?,
            sigterm: signal(SignalKind::terminate()).map_err(PipelineError::Signal)?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigint.recv() => info!("SIGINT (Ctrl+C) received, draining sink"),
            _ = self.sigterm.recv() => info!("SIGTERM received, draining sink"),
        }
    }
}

/// Feeds lines from `reader` into the sink until input ends or a shutdown signal
/// arrives, then waits for the sink to drain.
///
/// A signal stops intake both while waiting for input and while waiting for the sink to
/// take the next record. Records already handed to the sink are still written.
pub async fn run_with_shutdown<R, S>(
    reader: R,
    sink: S,
    capacity: usize,
) -> Result<RunSummary, PipelineError>
where
    R: AsyncBufRead + Unpin,
    S: RecordSink + Send + 'static,
{
    let mut shutdown = Shutdown::install()?;
    let (tx, handle) = spawn_sink(sink, capacity);
    let mut lines = reader.lines();
    let mut line_number: u64 = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(PipelineError::Input),
            () = shutdown.recv() => Ok(None),
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                drop(tx);
                join_logged(handle, "sink").await;
                return Err(err);
            }
        };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        let record = match parse_record(&line) {
            Ok(record) => record,
            Err(err) => {
                warn!(line = line_number, error = %err, "skipping line that is not a JSON object");
                continue;
            }
        };

        tokio::select! {
            sent = tx.send(record) => {
                if sent.is_err() {
                    debug!("sink stopped accepting records");
                    break;
                }
            }
            () = shutdown.recv() => break,
        }
    }

    drop(tx);

    Ok(handle.await??)
}

/// Awaits a background task, logging instead of propagating a panic or cancellation.
async fn join_logged<T>(handle: JoinHandle<T>, task: &str) -> Option<T> {
    match handle.await {
        Ok(output) => Some(output),
        Err(err) => {
            warn!(task, error = %err, "background task failed");
            None
        }
    }
}

async fn open_input(
    source: &InputSource,
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, PipelineError> {
    match source {
        InputSource::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        InputSource::File { path } => open_file(path).await,
    }
}

async fn open_file(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, PipelineError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(PipelineError::Input)?;
    Ok(Box::new(BufReader::new(file)))
}

/// Logs every notification of the sink until it is dropped.
async fn log_events(mut events: mpsc::UnboundedReceiver<SinkEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SinkEvent::Connection(err) => error!(error = %err, "sink could not connect"),
            SinkEvent::WriteFailed { error } => {
                warn!(code = ?error.code, error = %error, "write error");
            }
            SinkEvent::FlushFailed { error, group_size } => {
                warn!(code = ?error.code, group_size, error = %error, "execute error");
            }
            SinkEvent::Done => info!("all done"),
        }
    }
}

/// Logs the pipeline configuration without the connection uri.
fn log_config(config: &PipelineConfig) {
    let sink = &config.sink;
    debug!(
        sink_target = sink.target.as_deref().unwrap_or_default(),
        batch_mode = sink.batch.as_ref().map(|b| b.mode.as_str()),
        connection_options = sink.connection.as_ref().map_or(0, |c| c.len()),
        "sink configuration"
    );

    log_input_config(&config.input);

    match &config.backend {
        BackendConfig::Memory { unique_key } => {
            debug!(unique_key = unique_key.as_deref(), "using memory backend");
        }
    }
}

fn log_input_config(config: &InputConfig) {
    match &config.source {
        InputSource::Stdin => debug!(capacity = config.channel_capacity, "reading stdin"),
        InputSource::File { path } => debug!(
            path = %path.display(),
            capacity = config.channel_capacity,
            "reading file"
        ),
    }
}
