//! Configuration structures for the Model Manager client
//!
//! Configurations are loaded from YAML files or from `MODEL_MANAGER_*`
//! environment variables.

use crate::error::{ModelManagerError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the Model Manager client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Schema limits enforced at construction time
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Observability configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Limits applied by the schema layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum number of items accepted in one batch request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub structured_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            structured_logging: false,
        }
    }
}

/// Default value functions
fn default_max_batch_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ModelManagerError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: ClientConfig = serde_yaml::from_str(&content).map_err(|e| {
            ModelManagerError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_batch_size = match lookup("MODEL_MANAGER_MAX_BATCH_SIZE") {
            Some(raw) => raw.parse().map_err(|_| {
                ModelManagerError::config(format!("Invalid MODEL_MANAGER_MAX_BATCH_SIZE: {}", raw))
            })?,
            None => default_max_batch_size(),
        };

        let structured_logging = match lookup("MODEL_MANAGER_STRUCTURED_LOGGING") {
            Some(raw) => raw.parse().map_err(|_| {
                ModelManagerError::config(format!(
                    "Invalid MODEL_MANAGER_STRUCTURED_LOGGING: {}",
                    raw
                ))
            })?,
            None => false,
        };

        let config = ClientConfig {
            schema: SchemaConfig { max_batch_size },
            observability: Some(ObservabilityConfig {
                log_level: lookup("MODEL_MANAGER_LOG_LEVEL").unwrap_or_else(default_log_level),
                structured_logging,
            }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.schema.max_batch_size == 0 {
            return Err(ModelManagerError::config("schema.max_batch_size must be > 0"));
        }

        if let Some(observability) = &self.observability {
            match observability.log_level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ModelManagerError::config(format!(
                        "Invalid log level: {}",
                        other
                    )));
                }
            }
        }

        Ok(())
    }

    /// Observability settings, falling back to defaults when absent
    pub fn observability(&self) -> ObservabilityConfig {
        self.observability.clone().unwrap_or_default()
    }
}
