// gastos2parquet configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from GASTOS2PARQUET_CONFIG env var
// 3. Config file contents from GASTOS2PARQUET_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.gastos2parquet.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

pub const DEFAULT_ENDPOINT: &str = "https://brasil.io/api/v1/dataset/gastos-diretos/gastos/data";

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: DriverConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Remote page source configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    /// Value sent as `Authorization: Token <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub page_limit: u32,
    /// Pause after every page fetched from the network
    pub page_delay_ms: u64,
    /// Unset means requests never time out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            page_limit: 1000,
            page_delay_ms: 1000,
            request_timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("page_limit", &self.page_limit)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl SourceConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Behaviour on HTTP 429 responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub strategy: BackoffStrategy,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Consecutive 429 responses tolerated for a single page
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            initial_backoff_ms: 10_000,
            max_backoff_ms: 300_000,
            max_retries: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

impl std::fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffStrategy::Fixed => write!(f, "fixed"),
            BackoffStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for BackoffStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" | "constant" => Ok(BackoffStrategy::Fixed),
            "exponential" | "exp" => Ok(BackoffStrategy::Exponential),
            _ => anyhow::bail!(
                "Unsupported backoff strategy: {}. Supported: fixed, exponential",
                s
            ),
        }
    }
}

/// Dataset layout on local storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding every layer
    pub root: String,
    pub raw_dir: String,
    pub bronze_dir: String,
    pub silver_dir: String,
    pub gold_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "dataset".to_string(),
            raw_dir: "raw".to_string(),
            bronze_dir: "bronze".to_string(),
            silver_dir: "silver".to_string(),
            gold_dir: "gold".to_string(),
        }
    }
}

impl StorageConfig {
    /// Layer directories relative to `root`, in pipeline order.
    pub fn layer_dirs(&self) -> [&str; 4] {
        [
            &self.raw_dir,
            &self.bronze_dir,
            &self.silver_dir,
            &self.gold_dir,
        ]
    }
}

/// Fetch-then-transform sequencing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Transform records even when the fetch stopped early
    pub transform_partial: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            transform_partial: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Resolve file and env layers without validating, for callers that
    /// apply further overrides first. `None` searches the usual locations.
    pub fn load_unvalidated(path: Option<&std::path::Path>) -> Result<Self> {
        sources::load_layers(path, &sources::StdEnvSource)
    }

    /// Parse TOML content on top of the defaults. Sections missing from the
    /// content keep their default values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse pipeline config")
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: PipelineConfig) {
        self.source = other.source;
        self.rate_limit = other.rate_limit;
        self.storage = other.storage;
        self.pipeline = other.pipeline;
        self.log = other.log;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from optional inline TOML plus overrides
    /// supplied by an `EnvSource`.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = PipelineConfig::default();

        if let Some(inline) = inline_config {
            config.merge(PipelineConfig::from_toml_str(inline)?);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
