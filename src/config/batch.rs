use std::{fmt, num::NonZeroUsize, str::FromStr};

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

/// Number of records accumulated before an automatic flush when no size is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Ordering contract for a grouped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchMode {
    /// Apply operations in submission order and stop at the first failure.
    Ordered,
    /// Apply operations in any order and continue past individual failures.
    Unordered,
}

impl BatchMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Ordered => "ordered",
            BatchMode::Unordered => "unordered",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the lowercase and uppercase spellings only.
impl FromStr for BatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" | "ORDERED" => Ok(BatchMode::Ordered),
            "unordered" | "UNORDERED" => Ok(BatchMode::Unordered),
            _ => Err(ConfigError::InvalidBatchMode(s.to_string())),
        }
    }
}

/// Raw batch options as provided by the caller or the configuration files.
///
/// Values are kept loosely typed so that malformed input surfaces as a
/// [`ConfigError`] when the sink is constructed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchOptions {
    pub mode: String,
    #[serde(default)]
    pub buffer_size: Option<Value>,
}

impl BatchOptions {
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            buffer_size: None,
        }
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: i64) -> Self {
        self.buffer_size = Some(Value::from(buffer_size));
        self
    }
}

/// Validated batching settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub mode: BatchMode,
    pub buffer_size: NonZeroUsize,
}

impl TryFrom<&BatchOptions> for BatchConfig {
    type Error = ConfigError;

    fn try_from(options: &BatchOptions) -> Result<Self, Self::Error> {
        let mode = options.mode.parse()?;
        let buffer_size = match &options.buffer_size {
            None | Some(Value::Null) => default_buffer_size(),
            Some(value) => parse_buffer_size(value)?,
        };

        Ok(Self { mode, buffer_size })
    }
}

fn default_buffer_size() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(DEFAULT_BUFFER_SIZE - 1)
}

fn parse_buffer_size(value: &Value) -> Result<NonZeroUsize, ConfigError> {
    value
        .as_u64()
        .and_then(|size| usize::try_from(size).ok())
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| ConfigError::InvalidBufferSize(value.to_string()))
}
