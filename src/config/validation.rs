// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    validate_source_config(&config.source)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.endpoint.is_empty() {
        bail!(
            "Source endpoint is required\n\n\
            How to fix:\n\
              • Environment: export {}ENDPOINT=https://brasil.io/api/v1/dataset/gastos-diretos/gastos/data\n\
              • TOML: [source]\n              endpoint = \"https://...\"\n",
            ENV_PREFIX
        );
    }

    if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
        bail!("source.endpoint must be an http(s) URL, got '{}'", config.endpoint);
    }

    if config.page_limit == 0 {
        bail!("source.page_limit must be greater than 0");
    }

    if config.token.is_none() {
        warn!(
            "No API token configured; requests are sent without an Authorization header. \
             Set {}API_TOKEN to authenticate",
            ENV_PREFIX
        );
    }

    if config.request_timeout_secs == Some(0) {
        bail!("source.request_timeout_secs must be greater than 0 when set");
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<()> {
    if config.max_backoff_ms < config.initial_backoff_ms {
        bail!(
            "rate_limit.max_backoff_ms ({}) must not be smaller than rate_limit.initial_backoff_ms ({})",
            config.max_backoff_ms,
            config.initial_backoff_ms
        );
    }

    if config.max_retries > 1_000 {
        warn!(
            max_retries = config.max_retries,
            "rate_limit.max_retries is very large; a throttling server may stall the pipeline"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.root.is_empty() {
        bail!(
            "Dataset root is required\n\n\
            How to fix:\n\
              • Environment: export {}DATA_ROOT=./dataset\n\
              • TOML: [storage]\n              root = \"./dataset\"\n",
            ENV_PREFIX
        );
    }

    let dirs = config.layer_dirs();
    for (i, dir) in dirs.iter().enumerate() {
        if dir.is_empty() {
            bail!("storage layer directories must not be empty");
        }
        if dir.contains("..") || dir.starts_with('/') {
            bail!("storage layer directory '{}' must be relative to the root", dir);
        }
        if dirs[..i].contains(dir) {
            bail!("storage layer directory '{}' is used by more than one layer", dir);
        }
    }

    Ok(())
}
