//! Node configuration for the Arbor node.
//!
//! [`NodeConfig`] is assembled in layers: built-in defaults, then an optional
//! TOML file, then `ARBOR_`-prefixed environment variables. Nested keys use a
//! double underscore, so `ARBOR_CHAIN__CUT_OFF_AGE=20` sets
//! `chain.cut_off_age`.

use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use arbor_core::constants::DEFAULT_INGEST_QUEUE_DEPTH;
use arbor_core::error::ArborError;
use arbor_core::ChainConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ARBOR";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ArborError::Config(format!("unknown log format {other:?}"))),
        }
    }
}

/// Configuration for a node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fork tree settings.
    pub chain: ChainConfig,
    /// Log level filter string (e.g. "info", "debug", "arbor_core=trace").
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Capacity of the block ingest channel.
    pub ingest_queue_depth: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            ingest_queue_depth: DEFAULT_INGEST_QUEUE_DEPTH,
        }
    }
}

impl NodeConfig {
    /// Per-user config file location, e.g. `~/.config/arbor/arbor.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arbor").join("arbor.toml"))
    }

    /// Load defaults, then `path` (if given), then the process environment.
    ///
    /// A missing file is an error when `path` is given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ArborError> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ArborError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            let name = path
                .to_str()
                .ok_or_else(|| ArborError::Config(format!("non-UTF-8 config path: {}", path.display())))?;
            builder = builder.add_source(File::new(name, FileFormat::Toml));
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| ArborError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ArborError> {
        if self.ingest_queue_depth == 0 {
            return Err(ArborError::Config("ingest_queue_depth must be positive".into()));
        }
        if self.log_level.trim().is_empty() {
            return Err(ArborError::Config("log_level must not be empty".into()));
        }
        Ok(())
    }
}
