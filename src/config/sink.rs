use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::{BatchConfig, BatchOptions};
use crate::error::{ConfigError, ConnectionError};

/// Options accepted when constructing a sink.
///
/// `target` and `uri` are optional here on purpose: their absence is reported when the
/// first record arrives, not at construction.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SinkOptions {
    /// Logical destination, e.g. a collection name.
    #[serde(default)]
    pub target: Option<String>,
    /// How to reach the backend.
    #[serde(default)]
    pub uri: Option<String>,
    /// Passed through untouched to the backend when connecting.
    #[serde(default)]
    pub connection: Option<Map<String, Value>>,
    /// Enables grouped writes when present.
    #[serde(default)]
    pub batch: Option<BatchOptions>,
}

impl SinkOptions {
    #[must_use]
    pub fn new(target: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_batch(mut self, batch: BatchOptions) -> Self {
        self.batch = Some(batch);
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: Map<String, Value>) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// Where a sink connects to, borrowed from validated settings.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub target: &'a str,
    pub uri: &'a str,
}

/// Sink options after construction-time validation. Immutable afterwards.
#[derive(Clone, Debug)]
pub struct SinkSettings {
    target: Option<String>,
    uri: Option<String>,
    connection: Map<String, Value>,
    batch: Option<BatchConfig>,
}

impl SinkSettings {
    /// Validates the batch options. Connection options are checked later by
    /// [`SinkSettings::endpoint`].
    pub fn validate(options: SinkOptions) -> Result<Self, ConfigError> {
        let batch = options
            .batch
            .as_ref()
            .map(BatchConfig::try_from)
            .transpose()?;

        Ok(Self {
            target: options.target,
            uri: options.uri,
            connection: options.connection.unwrap_or_default(),
            batch,
        })
    }

    /// Returns the endpoint to connect to, or the first missing connection option.
    pub fn endpoint(&self) -> Result<Endpoint<'_>, ConnectionError> {
        let target = non_empty(self.target.as_deref()).ok_or(ConnectionError::MissingTarget)?;
        let uri = non_empty(self.uri.as_deref()).ok_or(ConnectionError::MissingUri)?;

        Ok(Endpoint { target, uri })
    }

    #[must_use]
    pub fn connection(&self) -> &Map<String, Value> {
        &self.connection
    }

    #[must_use]
    pub fn batch(&self) -> Option<BatchConfig> {
        self.batch
    }

    /// Target name used for logs and metric labels, empty when unset.
    #[must_use]
    pub fn target_label(&self) -> &str {
        self.target.as_deref().unwrap_or_default()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Storage backend the daemon writes to.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process backend for testing and development.
    Memory {
        /// Field whose values must be unique within a target, besides `_id`.
        #[serde(default)]
        unique_key: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchMode, DEFAULT_BUFFER_SIZE};
    use serde_json::json;

    #[test]
    fn test_validate_without_batch() {
        let settings = SinkSettings::validate(SinkOptions::new("accounts", "memory://")).unwrap();
        assert!(settings.batch().is_none());
        assert_eq!(settings.target_label(), "accounts");
        assert!(settings.connection().is_empty());
    }

    #[test]
    fn test_validate_with_batch() {
        let options =
            SinkOptions::new("accounts", "memory://").with_batch(BatchOptions::new("ORDERED"));
        let batch = SinkSettings::validate(options).unwrap().batch().unwrap();
        assert_eq!(batch.mode, BatchMode::Ordered);
        assert_eq!(batch.buffer_size.get(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_validate_rejects_bad_batch() {
        let options = SinkOptions::new("accounts", "memory://").with_batch(BatchOptions::new("x"));
        assert_eq!(
            SinkSettings::validate(options).unwrap_err(),
            ConfigError::InvalidBatchMode("x".into())
        );
    }

    #[test]
    fn test_missing_connection_options_pass_validation() {
        let settings = SinkSettings::validate(SinkOptions::default()).unwrap();
        assert_eq!(settings.target_label(), "");
        assert_eq!(
            settings.endpoint().unwrap_err(),
            ConnectionError::MissingTarget
        );
    }

    #[test]
    fn test_endpoint_rejects_empty_values() {
        let settings = SinkSettings::validate(SinkOptions::new("accounts", "")).unwrap();
        assert_eq!(settings.endpoint().unwrap_err(), ConnectionError::MissingUri);

        let settings = SinkSettings::validate(SinkOptions::new("", "memory://")).unwrap();
        assert_eq!(
            settings.endpoint().unwrap_err(),
            ConnectionError::MissingTarget
        );
    }

    #[test]
    fn test_deserialize_options() {
        let options: SinkOptions = serde_json::from_value(json!({
            "target": "accounts",
            "uri": "memory://local",
            "connection": {"pool_size": 4},
            "batch": {"mode": "unordered", "buffer_size": 20}
        }))
        .unwrap();

        let settings = SinkSettings::validate(options).unwrap();
        let endpoint = settings.endpoint().unwrap();
        assert_eq!(endpoint.target, "accounts");
        assert_eq!(endpoint.uri, "memory://local");
        assert_eq!(settings.connection().get("pool_size"), Some(&json!(4)));
        assert_eq!(settings.batch().unwrap().buffer_size.get(), 20);
    }

    #[test]
    fn test_connection_must_be_a_map() {
        let result = serde_json::from_value::<SinkOptions>(json!({
            "target": "accounts",
            "uri": "memory://",
            "connection": "pool_size=4"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_config() {
        let config: BackendConfig =
            serde_json::from_value(json!({"type": "memory", "unique_key": "email"})).unwrap();
        let BackendConfig::Memory { unique_key } = config;
        assert_eq!(unique_key.as_deref(), Some("email"));
    }
}
