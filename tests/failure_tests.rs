use bulksink::config::{BatchOptions, SinkOptions};
use bulksink::error::{ConnectionError, EventKind, SinkError};
use bulksink::ingest::{Ack, IngestSink};
use bulksink::pipeline::{pipe, spawn_sink};
use bulksink::test_utils::{
    FailableBackend, SIMULATED_ERROR_CODE, drain_events, make_records, sequence_numbers,
};
use bulksink::types::SinkEvent;
use futures::stream;

const TARGET: &str = "accounts";

fn options() -> SinkOptions {
    SinkOptions::new(TARGET, "memory://local")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_failure_breaks_pipeline() {
    let backend = FailableBackend::new();
    backend.fail_connect();
    let mut sink = IngestSink::new(options(), backend.clone()).unwrap();
    let mut events = sink.subscribe();

    let err = pipe(stream::iter(make_records(10)), &mut sink)
        .await
        .unwrap_err();

    match err {
        SinkError::Connection(ConnectionError::Establish { target, source }) => {
            assert_eq!(target, TARGET);
            assert_eq!(source.code, Some(SIMULATED_ERROR_CODE));
        }
        other => panic!("expected a connection error, got {other:?}"),
    }

    let events = drain_events(&mut events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::Connection);
    assert_eq!(backend.write_call_count(), 0);
    assert_eq!(backend.memory().count(TARGET).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_write_is_acknowledged() {
    let backend = FailableBackend::new();
    backend.fail_write_on_call(2);
    let mut sink = IngestSink::new(options(), backend.clone()).unwrap();
    let mut events = sink.subscribe();

    for record in make_records(5) {
        assert_eq!(sink.submit(record).await.unwrap(), Ack::Written);
    }
    let summary = sink.finish().await.unwrap();

    assert_eq!(backend.write_call_count(), 5);
    assert_eq!(
        sequence_numbers(&backend.memory().records(TARGET).await),
        vec![0, 1, 3, 4]
    );
    assert_eq!(summary.write_failures, 1);

    let events = drain_events(&mut events);
    assert!(matches!(
        &events[0],
        SinkEvent::WriteFailed { error } if error.code == Some(SIMULATED_ERROR_CODE)
    ));
    assert_eq!(events[1], SinkEvent::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_flush_drops_group_and_continues() {
    let backend = FailableBackend::new();
    backend.fail_execute_on_call(1);
    let batch = BatchOptions::new("ordered").with_buffer_size(3);
    let mut sink = IngestSink::new(options().with_batch(batch), backend.clone()).unwrap();
    let mut events = sink.subscribe();

    let summary = pipe(stream::iter(make_records(8)), &mut sink)
        .await
        .unwrap();

    assert_eq!(backend.execute_call_count(), 3);
    assert_eq!(
        sequence_numbers(&backend.memory().records(TARGET).await),
        vec![0, 1, 2, 6, 7]
    );
    assert_eq!(summary.flushes, 3);
    assert_eq!(summary.flush_failures, 1);
    assert_eq!(sink.pending_len(), 0);

    assert_eq!(
        drain_events(&mut events)
            .iter()
            .map(SinkEvent::kind)
            .collect::<Vec<_>>(),
        vec![EventKind::FlushFailed, EventKind::Done]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_final_flush_still_completes() {
    let backend = FailableBackend::new();
    backend.fail_execute_on_call(0);
    let batch = BatchOptions::new("unordered");
    let mut sink = IngestSink::new(options().with_batch(batch), backend.clone()).unwrap();
    let mut events = sink.subscribe();

    for record in make_records(4) {
        sink.submit(record).await.unwrap();
    }
    let summary = sink.finish().await.unwrap();

    assert_eq!(summary.flush_failures, 1);
    assert_eq!(backend.memory().count(TARGET).await, 0);
    assert_eq!(backend.memory().release_count().await, 1);

    let events = drain_events(&mut events);
    assert!(matches!(
        events[0],
        SinkEvent::FlushFailed { group_size: 4, .. }
    ));
    assert_eq!(events[1], SinkEvent::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_spawned_sink_reports_done_after_drain() {
    let backend = FailableBackend::new();
    let batch = BatchOptions::new("ordered").with_buffer_size(10);
    let mut sink = IngestSink::new(options().with_batch(batch), backend.clone()).unwrap();
    let mut events = sink.subscribe();

    let (tx, handle) = spawn_sink(sink, 4);
    for record in make_records(25) {
        tx.send(record).await.unwrap();
    }
    drop(tx);

    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.flushes, 3);
    assert_eq!(backend.memory().count(TARGET).await, 25);
    assert_eq!(events.recv().await, Some(SinkEvent::Done));
    assert_eq!(events.recv().await, None);
}
