pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
