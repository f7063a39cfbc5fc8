//! Replica configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tagsync_core::{Tag, TagSyncError};
use tagsync_state::{AllowAll, DenyList, NamespaceAllowList, TagValidator};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid tag in validator config: {0}")]
    InvalidTag(#[from] TagSyncError),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// Admission policy selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ValidatorConfig {
    #[default]
    AllowAll,
    DenyList {
        tags: Vec<String>,
    },
    NamespaceAllowList {
        roots: Vec<String>,
    },
}

impl ValidatorConfig {
    /// Build the validator, rejecting malformed tag names
    pub fn build(&self) -> Result<Arc<dyn TagValidator>, ConfigError> {
        Ok(match self {
            ValidatorConfig::AllowAll => Arc::new(AllowAll),
            ValidatorConfig::DenyList { tags } => Arc::new(DenyList::new(parse_tags(tags)?)),
            ValidatorConfig::NamespaceAllowList { roots } => {
                Arc::new(NamespaceAllowList::new(parse_tags(roots)?))
            }
        })
    }
}

fn parse_tags(names: &[String]) -> Result<Vec<Tag>, ConfigError> {
    names
        .iter()
        .map(|name| Tag::new(name.as_str()).map_err(ConfigError::from))
        .collect()
}

/// Logging output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".into(),
            json: false,
        }
    }
}

/// Replica configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Tick interval of the async driver
    pub tick_interval_ms: u64,
    /// Maximum queued incoming envelopes
    pub max_incoming: usize,
    /// Maximum queued outgoing envelopes
    pub max_outgoing: usize,
    pub validator: ValidatorConfig,
    pub logging: LoggingConfig,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        ReplicaConfig {
            tick_interval_ms: 10,
            max_incoming: 10_000,
            max_outgoing: 10_000,
            validator: ValidatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReplicaConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ReplicaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.max_incoming == 0 || self.max_outgoing == 0 {
            return Err(ConfigError::Invalid("queue limits must be positive".into()));
        }
        self.validator.build().map(|_| ())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
