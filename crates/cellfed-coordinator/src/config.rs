//! Configuration loading and typed config structures for the coordinator.
//!
//! The configuration lives in `cellfed-config.yaml` in the working
//! directory, or at the path named by `CELLFED_CONFIG`. Every field has a
//! default, so a missing file or a partial file is fine. A few values can
//! be overridden from the environment for container deployments:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CELLFED_HOST` | `server.host` |
//! | `CELLFED_PORT` | `server.port` |
//! | `CELLFED_QUORUM` | `aggregation.quorum` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::aggregator::{AggregationSettings, StalePolicy};
use crate::server::ServerConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "cellfed-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value `{value}` for {var}")]
    Env {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level coordinator configuration, mirroring `cellfed-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoordinatorConfig {
    /// Listen address.
    #[serde(default)]
    pub server: ServerSection,

    /// Round and quorum settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Initial global model.
    #[serde(default)]
    pub model: ModelInitConfig,
}

impl CoordinatorConfig {
    /// Load from `CELLFED_CONFIG` or [`DEFAULT_CONFIG_FILE`], falling back to
    /// defaults when the file does not exist, then apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CELLFED_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override fields from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Override fields from any variable source.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("CELLFED_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CELLFED_PORT") {
            self.server.port = parse_var("CELLFED_PORT", port)?;
        }
        if let Some(quorum) = lookup("CELLFED_QUORUM") {
            self.aggregation.quorum = parse_var("CELLFED_QUORUM", quorum)?;
        }
        Ok(())
    }

    /// Listen address for the HTTP server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }

    /// Settings for the aggregation coordinator.
    pub const fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            quorum: self.aggregation.quorum,
            stale_policy: self.aggregation.stale_submissions,
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_err| ConfigError::Env { var, value })
}

/// `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

/// `aggregation` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AggregationConfig {
    /// Updates needed to close a round.
    #[serde(default = "default_quorum")]
    pub quorum: usize,

    /// `accept` (default) or `reject` updates tagged with an older round.
    #[serde(default)]
    pub stale_submissions: StalePolicy,

    /// Warn when no round has closed for this many seconds. `0` disables
    /// the warning.
    #[serde(default = "default_staleness_warn_secs")]
    pub staleness_warn_secs: u64,
}

impl AggregationConfig {
    /// [`Self::staleness_warn_secs`] as a duration, `None` when disabled.
    pub const fn staleness_warn_after(&self) -> Option<Duration> {
        if self.staleness_warn_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.staleness_warn_secs))
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            quorum: default_quorum(),
            stale_submissions: StalePolicy::default(),
            staleness_warn_secs: default_staleness_warn_secs(),
        }
    }
}

const fn default_quorum() -> usize {
    2
}

const fn default_staleness_warn_secs() -> u64 {
    300
}

/// `model` section: how the round-0 global model is initialised.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInitConfig {
    /// Seed for the initial weights.
    #[serde(default = "default_init_seed")]
    pub init_seed: u64,

    /// Initial weights are uniform in `[-init_scale, init_scale)`.
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
}

impl Default for ModelInitConfig {
    fn default() -> Self {
        Self {
            init_seed: default_init_seed(),
            init_scale: default_init_scale(),
        }
    }
}

const fn default_init_seed() -> u64 {
    42
}

const fn default_init_scale() -> f32 {
    0.02
}
