// Initialization utilities
//
// Storage operator, dataset layout and logging/tracing setup

use crate::config::{LogConfig, LogFormat, StorageConfig};
use anyhow::{Context, Result};
use opendal::Operator;
use tracing::info;

/// Initialize the storage operator rooted at the dataset root
pub fn init_storage(config: &StorageConfig) -> Result<Operator> {
    info!("Using filesystem storage at: {}", config.root);
    crate::writer::build_operator(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage: {}", e))
}

/// Create every layer directory under the dataset root.
///
/// Existing directories are left untouched, so this is safe to run on each start.
pub async fn bootstrap_layout(operator: &Operator, config: &StorageConfig) -> Result<()> {
    for dir in config.layer_dirs() {
        let path = format!("{}/", dir.trim_end_matches('/'));
        operator
            .create_dir(&path)
            .await
            .with_context(|| format!("Failed to create layer directory '{}'", path))?;
    }
    info!("Dataset layout ready: {}", config.layer_dirs().join(", "));
    Ok(())
}

/// Initialize tracing/logging from LogConfig
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_all_layers() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            root: tmp.path().to_string_lossy().to_string(),
            ..Default::default()
        };

        let operator = init_storage(&config).unwrap();
        bootstrap_layout(&operator, &config).await.unwrap();
        // Second run is a no-op
        bootstrap_layout(&operator, &config).await.unwrap();

        for layer in ["raw", "bronze", "silver", "gold"] {
            assert!(tmp.path().join(layer).is_dir(), "missing {layer}");
        }
    }

    #[test]
    fn init_tracing_is_idempotent() {
        let config = LogConfig::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
