//! Error types for Parquet writer operations.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Partition column missing or holding invalid values
    E001InvalidPartition,
    /// E002: Arrow/Parquet encoding failed
    E002EncodeFailure,
    /// E003: Storage configuration missing or invalid
    E003InvalidConfig,
    /// E004: Write operation failed
    E004WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidPartition => "E001",
            Self::E002EncodeFailure => "E002",
            Self::E003InvalidConfig => "E003",
            Self::E004WriteFailure => "E004",
        }
    }
}

/// Errors that can occur during Parquet writing operations
#[derive(Debug, Error)]
pub enum WriterError {
    /// Partition column missing, mistyped or null
    #[error("[{code}] Invalid partition column '{column}': {message}")]
    InvalidPartition {
        code: &'static str,
        column: String,
        message: String,
    },

    /// Arrow or Parquet encoding failed
    #[error("[{code}] Parquet encoding failed: {message}")]
    EncodeFailure { code: &'static str, message: String },

    /// Invalid storage configuration provided
    #[error("[{code}] Invalid storage configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed for '{path}': {message}")]
    WriteFailure {
        code: &'static str,
        path: String,
        message: String,
    },
}

impl WriterError {
    /// Create an invalid partition error with error code
    pub fn invalid_partition(column: &str, message: impl Into<String>) -> Self {
        Self::InvalidPartition {
            code: ErrorCode::E001InvalidPartition.as_str(),
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Create an encode failure error with error code
    pub fn encode_failure(message: impl Into<String>) -> Self {
        Self::EncodeFailure {
            code: ErrorCode::E002EncodeFailure.as_str(),
            message: message.into(),
        }
    }

    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E003InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(path: &str, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E004WriteFailure.as_str(),
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPartition { code, .. }
            | Self::EncodeFailure { code, .. }
            | Self::InvalidConfig { code, .. }
            | Self::WriteFailure { code, .. } => code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
