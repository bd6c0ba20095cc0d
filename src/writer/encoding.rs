// Parquet encoding with content hashing
//
// Serializes Arrow RecordBatches to Parquet bytes in memory and computes a
// Blake3 hash while encoding, so file names can be derived from content.

use arrow::array::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use std::io::{self, Write};
use std::sync::OnceLock;

use super::error::{Result, WriterError};

struct HashingBuffer {
    buffer: Vec<u8>,
    hasher: blake3::Hasher,
}

impl HashingBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            hasher: blake3::Hasher::new(),
        }
    }

    fn finish(self) -> (Vec<u8>, String) {
        let hash = self.hasher.finalize();
        (self.buffer, hex::encode(hash.as_bytes()))
    }
}

impl Write for HashingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Get shared writer properties (cached)
///
/// - Snappy compression
/// - Dictionary encoding enabled
/// - 32k rows per group
/// - Writer version and partition columns embedded in file metadata
pub fn writer_properties() -> &'static WriterProperties {
    static PROPERTIES: OnceLock<WriterProperties> = OnceLock::new();
    PROPERTIES.get_or_init(|| {
        let metadata = vec![
            KeyValue {
                key: "gastos2parquet.version".to_string(),
                value: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            KeyValue {
                key: "partition.columns".to_string(),
                value: Some(super::PARTITION_COLUMNS.join(",")),
            },
        ];

        WriterProperties::builder()
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_compression(Compression::SNAPPY)
            .set_data_page_size_limit(256 * 1024)
            .set_write_batch_size(32 * 1024)
            .set_max_row_group_size(32 * 1024)
            .set_dictionary_page_size_limit(128 * 1024)
            .set_key_value_metadata(Some(metadata))
            .build()
    })
}

/// Encode a batch as a Parquet file, returning the bytes and their Blake3
/// hash in hex.
pub fn encode_parquet(batch: &RecordBatch) -> Result<(Vec<u8>, String)> {
    let mut sink = HashingBuffer::new();
    {
        let mut writer =
            ArrowWriter::try_new(&mut sink, batch.schema(), Some(writer_properties().clone()))
                .map_err(|e| WriterError::encode_failure(e.to_string()))?;
        writer
            .write(batch)
            .map_err(|e| WriterError::encode_failure(e.to_string()))?;
        writer
            .close()
            .map_err(|e| WriterError::encode_failure(e.to_string()))?;
    }
    Ok(sink.finish())
}
