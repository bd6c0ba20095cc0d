//! Storage operator construction.

use opendal::Operator;
use std::path::PathBuf;

use super::error::{Result, WriterError};
use crate::config::StorageConfig;

/// Build a filesystem operator rooted at the dataset root.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    if config.root.is_empty() {
        return Err(WriterError::invalid_config("storage.root must not be empty"));
    }

    let mut root = PathBuf::from(&config.root);
    if root.is_relative() {
        let cwd = std::env::current_dir().map_err(|e| {
            WriterError::invalid_config(format!("Failed to resolve working directory: {}", e))
        })?;
        root = cwd.join(root);
    }

    let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
    let operator = Operator::new(builder)
        .map_err(|e| {
            WriterError::invalid_config(format!("Failed to create filesystem operator: {}", e))
        })?
        .finish();

    tracing::debug!(root = %root.display(), "Storage operator initialized");
    Ok(operator)
}
