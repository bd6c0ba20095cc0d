//! Partitioned Parquet writer for the bronze layer.
//!
//! Splits an Arrow RecordBatch by its partition columns and writes one
//! content-addressed Parquet file per partition using OpenDAL.

// Allow large error types - rich diagnostic messages are more valuable on error paths.
#![allow(clippy::result_large_err)]

mod encoding;
mod error;
mod partition;
mod storage;
mod write;

pub use encoding::{encode_parquet, writer_properties};
pub use error::{ErrorCode, Result, WriterError};
pub use partition::{partition_path, PARTITION_COLUMNS};
pub use storage::build_operator;
pub use write::{PartitionedWriter, WrittenPartition};
