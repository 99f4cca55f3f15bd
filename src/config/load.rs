use std::{
    fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Directory containing configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Environment variable holding an absolute path to the configuration directory.
const CONFIG_DIR_ENV_VAR: &str = "BULKSINK_CONFIG_DIR";

/// Environment variable holding the runtime environment name.
const ENVIRONMENT_ENV_VAR: &str = "BULKSINK_ENVIRONMENT";

/// Supported extensions for configuration files, in lookup order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable overrides (`BULKSINK_SINK__TARGET`).
const ENV_PREFIX: &str = "BULKSINK";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by loadable configuration structures.
pub trait Config {
    /// Keys whose environment values are split on commas into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Runtime environment, selects the optional override file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Environment {
    Prod,
    Staging,
    Dev,
}

impl Environment {
    /// Reads `BULKSINK_ENVIRONMENT`, defaulting to [`Environment::Prod`].
    fn load() -> Result<Self, io::Error> {
        match std::env::var(ENVIRONMENT_ENV_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Prod),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Prod => "prod",
            Environment::Staging => "staging",
            Environment::Dev => "dev",
        })
    }
}

impl FromStr for Environment {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prod" => Ok(Environment::Prod),
            "staging" => Ok(Environment::Staging),
            "dev" => Ok(Environment::Dev),
            other => Err(io::Error::other(format!(
                "{other} is not a supported environment, expected `prod`, `staging` or `dev`",
            ))),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate base configuration in `{directory}`; attempted: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    #[error("failed to determine runtime environment")]
    Environment(#[source] io::Error),

    #[error("failed to build configuration")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from files and `BULKSINK_`-prefixed environment variables.
///
/// The directory is taken from `BULKSINK_CONFIG_DIR`, or `./configuration` when unset.
/// `base.(yaml|yml|json)` is required, `{environment}.(yaml|yml|json)` is optional and
/// environment variables win over both. Nested keys use double underscores
/// (`BULKSINK_SINK__BATCH__BUFFER_SIZE=20`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = configuration_directory()?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let base_file = find_configuration_file(&directory, "base").ok_or_else(|| {
        LoadConfigError::BaseFileMissing {
            attempted: attempted_paths(&directory, "base"),
            directory: directory.clone(),
        }
    })?;
    let environment_file = find_configuration_file(&directory, &environment.to_string());

    let mut env_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    if !T::LIST_PARSE_KEYS.is_empty() {
        env_source = env_source.list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            env_source = env_source.with_list_parse_key(key);
        }
    }

    let mut builder = config::Config::builder().add_source(config::File::from(base_file));
    if let Some(file) = environment_file {
        builder = builder.add_source(config::File::from(file));
    }

    builder
        .add_source(env_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn configuration_directory() -> Result<PathBuf, LoadConfigError> {
    let directory = match std::env::var(CONFIG_DIR_ENV_VAR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir()
            .map_err(LoadConfigError::CurrentDir)?
            .join(CONFIGURATION_DIR),
    };

    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(directory));
    }

    Ok(directory)
}

fn find_configuration_file(directory: &Path, stem: &str) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, stem: &str) -> String {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|ext| format!("`{}`", directory.join(format!("{stem}.{ext}")).display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, PipelineConfig, SinkSettings};
    use serde::Deserialize;
    use std::fs;
    use temp_env::with_vars;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        value: String,
        number: i32,
    }

    impl Config for TestConfig {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    fn config_dir(temp_dir: &TempDir) -> PathBuf {
        let dir = temp_dir.path().join("configuration");
        fs::create_dir(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_with_base_only() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);
        fs::write(dir.join("base.yml"), "value: \"from_base\"\nnumber: 42\n").unwrap();

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("prod")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
                ("BULKSINK_VALUE", None),
                ("BULKSINK_NUMBER", None),
            ],
            || {
                let config: TestConfig = load_config().unwrap();
                assert_eq!(config.value, "from_base");
                assert_eq!(config.number, 42);
            },
        );
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);
        fs::write(dir.join("base.yaml"), "value: \"from_base\"\nnumber: 42\n").unwrap();
        fs::write(dir.join("dev.json"), r#"{"value": "from_dev"}"#).unwrap();

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("dev")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
                ("BULKSINK_VALUE", None),
                ("BULKSINK_NUMBER", None),
            ],
            || {
                let config: TestConfig = load_config().unwrap();
                assert_eq!(config.value, "from_dev");
                assert_eq!(config.number, 42);
            },
        );
    }

    #[test]
    fn test_env_vars_override_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);
        fs::write(dir.join("base.yml"), "value: \"from_base\"\nnumber: 42\n").unwrap();

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("prod")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
                ("BULKSINK_VALUE", Some("from_env")),
                ("BULKSINK_NUMBER", Some("123")),
            ],
            || {
                let config: TestConfig = load_config().unwrap();
                assert_eq!(config.value, "from_env");
                assert_eq!(config.number, 123);
            },
        );
    }

    #[test]
    fn test_missing_base_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("prod")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
            ],
            || {
                let err = load_config::<TestConfig>().unwrap_err();
                assert!(matches!(err, LoadConfigError::BaseFileMissing { .. }));
            },
        );
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        with_vars(
            [("BULKSINK_CONFIG_DIR", Some(missing.to_str().unwrap()))],
            || {
                let err = load_config::<TestConfig>().unwrap_err();
                assert!(matches!(
                    err,
                    LoadConfigError::MissingConfigurationDirectory(_)
                ));
            },
        );
    }

    #[test]
    fn test_unknown_environment_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);
        fs::write(dir.join("base.yml"), "value: \"x\"\nnumber: 1\n").unwrap();

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("qa")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
            ],
            || {
                let err = load_config::<TestConfig>().unwrap_err();
                assert!(matches!(err, LoadConfigError::Environment(_)));
            },
        );
    }

    #[test]
    fn test_load_pipeline_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = config_dir(&temp_dir);
        let base = r#"
sink:
  target: accounts
  uri: "memory://local"
  batch:
    mode: ordered
backend:
  type: memory
  unique_key: email
"#;
        fs::write(dir.join("base.yml"), base).unwrap();

        with_vars(
            [
                ("BULKSINK_ENVIRONMENT", Some("prod")),
                ("BULKSINK_CONFIG_DIR", Some(dir.to_str().unwrap())),
                ("BULKSINK_SINK__BATCH__BUFFER_SIZE", Some("20")),
            ],
            || {
                let config: PipelineConfig = load_config().unwrap();
                let BackendConfig::Memory { unique_key } = &config.backend;
                assert_eq!(unique_key.as_deref(), Some("email"));
                assert_eq!(config.input.channel_capacity, 16);
                assert!(!config.metrics.enabled);

                let settings = SinkSettings::validate(config.sink).unwrap();
                assert_eq!(settings.batch().unwrap().buffer_size.get(), 20);
            },
        );
    }
}
