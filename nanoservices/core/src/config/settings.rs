use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::config::loader::ConfigError;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_PUSH_JOB: &str = "etlflow";

/// Engine settings, separate from the dataflow documents it runs.
///
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file for executions and lineage. In-memory when unset.
    pub db_path: Option<PathBuf>,
    /// Pushgateway base URL, e.g. `http://pushgateway:9091`.
    pub pushgateway_url: Option<String>,
    pub push_job: Option<String>,
    /// Bind address for the `/metrics` exporter.
    pub metrics_addr: Option<String>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.pushgateway()?;
        Ok(settings)
    }

    pub fn pushgateway(&self) -> Result<Option<Url>, ConfigError> {
        self.pushgateway_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::invalid("pushgateway_url", e.to_string()))
            })
            .transpose()
    }

    pub fn push_job(&self) -> &str {
        self.push_job.as_deref().unwrap_or(DEFAULT_PUSH_JOB)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
