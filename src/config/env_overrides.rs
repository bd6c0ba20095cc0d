use super::{BackoffStrategy, LogFormat, PipelineConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "GASTOS2PARQUET_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable by its suffix; the `GASTOS2PARQUET_` prefix is implied.
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the pipeline config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut PipelineConfig, env: &E) -> Result<()> {
    // Source
    if let Some(endpoint) = get_env_string(env, "ENDPOINT") {
        config.source.endpoint = endpoint;
    }
    if let Some(token) = get_env_string(env, "API_TOKEN") {
        config.source.token = if token.is_empty() { None } else { Some(token) };
    }
    if let Some(val) = get_env_u32(env, "PAGE_LIMIT")? {
        config.source.page_limit = val;
    }
    if let Some(val) = get_env_u64(env, "PAGE_DELAY_MS")? {
        config.source.page_delay_ms = val;
    }
    if let Some(val) = get_env_u64(env, "REQUEST_TIMEOUT_SECS")? {
        config.source.request_timeout_secs = if val == 0 { None } else { Some(val) };
    }

    // Rate limiting
    if let Some(strategy) = get_env_string(env, "BACKOFF_STRATEGY") {
        config.rate_limit.strategy = strategy
            .parse::<BackoffStrategy>()
            .context("Invalid GASTOS2PARQUET_BACKOFF_STRATEGY value")?;
    }
    if let Some(val) = get_env_u64(env, "BACKOFF_MS")? {
        config.rate_limit.initial_backoff_ms = val;
    }
    if let Some(val) = get_env_u64(env, "MAX_BACKOFF_MS")? {
        config.rate_limit.max_backoff_ms = val;
    }
    if let Some(val) = get_env_u32(env, "MAX_RETRIES")? {
        config.rate_limit.max_retries = val;
    }

    // Storage layout
    if let Some(root) = get_env_string(env, "DATA_ROOT") {
        config.storage.root = root;
    }
    if let Some(dir) = get_env_string(env, "RAW_DIR") {
        config.storage.raw_dir = dir;
    }
    if let Some(dir) = get_env_string(env, "BRONZE_DIR") {
        config.storage.bronze_dir = dir;
    }

    // Driver
    if let Some(val) = get_env_bool(env, "TRANSFORM_PARTIAL")? {
        config.pipeline.transform_partial = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .context("Invalid GASTOS2PARQUET_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
