//! Configuration for the bulksink daemon.
//!
//! Loads configuration from YAML files and environment variables.

use serde::Deserialize;

use crate::config::{BackendConfig, InputConfig, MetricsConfig, SinkOptions, load::Config};

/// Configuration for the pipeline.
///
/// Defines where records come from, how the sink groups them and which backend
/// receives them.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Sink options, validated when the sink is constructed.
    pub sink: SinkOptions,
    /// Destination backend.
    pub backend: BackendConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config for PipelineConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
