use std::path::PathBuf;

use serde::Deserialize;

/// Port the Prometheus exporter listens on unless configured otherwise.
const DEFAULT_METRICS_PORT: u16 = 9000;

/// Capacity of the channel between the record reader and the sink.
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Where the daemon reads newline-delimited JSON records from.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputSource {
    /// Read records from standard input.
    #[default]
    Stdin,
    /// Read records from a file.
    File { path: PathBuf },
}

/// Input settings for the daemon.
#[derive(Clone, Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub source: InputSource,
    /// Records the reader may run ahead of the sink before it is held back.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: InputSource::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Prometheus exporter settings.
#[derive(Clone, Debug, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_METRICS_PORT,
        }
    }
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}
