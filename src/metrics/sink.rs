use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};

/// Metric name for counting records accepted by the sink.
const SINK_RECORDS_SUBMITTED_TOTAL: &str = "sink_records_submitted_total";

/// Metric name for counting single-record writes issued in direct mode.
const SINK_SINGLE_WRITES_TOTAL: &str = "sink_single_writes_total";

/// Metric name for counting single-record writes rejected by the backend.
const SINK_WRITE_FAILURES_TOTAL: &str = "sink_write_failures_total";

/// Metric name for counting grouped writes issued in batch mode.
const SINK_FLUSHES_TOTAL: &str = "sink_flushes_total";

/// Metric name for counting grouped writes rejected by the backend.
const SINK_FLUSH_FAILURES_TOTAL: &str = "sink_flush_failures_total";

/// Metric name for counting records the backend reported as persisted.
const SINK_RECORDS_INSERTED_TOTAL: &str = "sink_records_inserted_total";

/// Metric name for the number of records per grouped write.
const SINK_FLUSH_GROUP_SIZE: &str = "sink_flush_group_size";

/// Label key for the sink target.
const TARGET_LABEL: &str = "target";

/// Registers sink metric descriptions with the global metrics recorder.
pub(crate) fn register_sink_metrics() {
    describe_counter!(
        SINK_RECORDS_SUBMITTED_TOTAL,
        Unit::Count,
        "Total number of records submitted to the sink"
    );
    describe_counter!(
        SINK_SINGLE_WRITES_TOTAL,
        Unit::Count,
        "Total number of single-record writes issued"
    );
    describe_counter!(
        SINK_WRITE_FAILURES_TOTAL,
        Unit::Count,
        "Total number of single-record writes that failed"
    );
    describe_counter!(
        SINK_FLUSHES_TOTAL,
        Unit::Count,
        "Total number of grouped writes issued"
    );
    describe_counter!(
        SINK_FLUSH_FAILURES_TOTAL,
        Unit::Count,
        "Total number of grouped writes that failed"
    );
    describe_counter!(
        SINK_RECORDS_INSERTED_TOTAL,
        Unit::Count,
        "Total number of records persisted by the backend"
    );
    describe_histogram!(
        SINK_FLUSH_GROUP_SIZE,
        Unit::Count,
        "Number of records sent per grouped write"
    );
}

pub fn record_records_submitted(target: &str, count: u64) {
    counter!(SINK_RECORDS_SUBMITTED_TOTAL, TARGET_LABEL => target.to_string()).increment(count);
}

pub fn record_single_write(target: &str) {
    counter!(SINK_SINGLE_WRITES_TOTAL, TARGET_LABEL => target.to_string()).increment(1);
}

pub fn record_write_failed(target: &str) {
    counter!(SINK_WRITE_FAILURES_TOTAL, TARGET_LABEL => target.to_string()).increment(1);
}

/// Records a grouped write and its size.
pub fn record_flush(target: &str, group_size: usize) {
    counter!(SINK_FLUSHES_TOTAL, TARGET_LABEL => target.to_string()).increment(1);
    histogram!(SINK_FLUSH_GROUP_SIZE, TARGET_LABEL => target.to_string())
        .record(group_size as f64);
}

pub fn record_flush_failed(target: &str) {
    counter!(SINK_FLUSH_FAILURES_TOTAL, TARGET_LABEL => target.to_string()).increment(1);
}

pub fn record_records_inserted(target: &str, count: u64) {
    counter!(SINK_RECORDS_INSERTED_TOTAL, TARGET_LABEL => target.to_string()).increment(count);
}
