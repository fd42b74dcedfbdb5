//! Service configuration, read once at startup from a YAML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::storage::DEFAULT_WINDOW_HOURS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub flowsheet: FlowsheetConfig,
    /// JSON array of entries to chart at startup.
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowsheetConfig {
    pub default_group: String,
    pub default_hours: i64,
}

impl Default for FlowsheetConfig {
    fn default() -> Self {
        FlowsheetConfig {
            default_group: "Pastoral Services".to_string(),
            default_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::Invalid("api.port must be non-zero".into()));
        }
        if self.flowsheet.default_hours <= 0 {
            return Err(ConfigError::Invalid(
                "flowsheet.default_hours must be positive".into(),
            ));
        }
        if self.flowsheet.default_group.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "flowsheet.default_group cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw)
}
