// Configuration source loading.
//
// Priority order:
// 1. Environment variables (GASTOS2PARQUET_* prefix)
// 2. Config file path from GASTOS2PARQUET_CONFIG
// 3. Inline config content from GASTOS2PARQUET_CONFIG_CONTENT
// 4. Default config files (./config.toml, ./.gastos2parquet.toml)
// 5. Built-in defaults

use super::env_overrides::{self, EnvSource, ENV_PREFIX};
use super::PipelineConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<PipelineConfig> {
    let config = load_layers(None, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path.
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let config = load_layers(Some(path.as_ref()), &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Resolve defaults, the config file and env overrides without validating.
///
/// An explicit `path` replaces the `GASTOS2PARQUET_CONFIG` / default-file
/// lookup. Callers that still apply their own overrides validate afterwards.
pub fn load_layers<E: EnvSource>(path: Option<&Path>, env: &E) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default();

    let file_config = match path {
        Some(path) => Some(read_config_file(path)?),
        None => load_from_file(env)?,
    };
    if let Some(file_config) = file_config {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<PipelineConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: PipelineConfig = toml::from_str(&content)
            .context("Failed to parse inline config from GASTOS2PARQUET_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in ["./config.toml", "./.gastos2parquet.toml"] {
        let path = Path::new(path);
        if path.exists() {
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub(super) struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}
