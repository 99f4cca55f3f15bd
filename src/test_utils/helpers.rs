use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::types::{Record, SinkEvent};

/// Builds a record carrying its sequence number.
#[must_use]
pub fn make_record(seq: u64) -> Record {
    object(json!({ "seq": seq, "name": format!("account-{seq}") }))
}

/// Builds `count` records numbered from zero.
#[must_use]
pub fn make_records(count: u64) -> Vec<Record> {
    (0..count).map(make_record).collect()
}

/// Builds a record with an explicit `_id`, for duplicate key scenarios.
#[must_use]
pub fn record_with_id(id: impl Into<Value>) -> Record {
    let mut record = Record::new();
    record.insert("_id".to_string(), id.into());
    record
}

/// Returns the sequence numbers of `records`, in order.
#[must_use]
pub fn sequence_numbers(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .filter_map(|r| r.get("seq").and_then(Value::as_u64))
        .collect()
}

/// Collects every notification already delivered to `events`.
pub fn drain_events(events: &mut mpsc::UnboundedReceiver<SinkEvent>) -> Vec<SinkEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
