//! Core write operations for bronze output.
//!
//! Groups rows by `(ano, mes)` and writes each group as its own Parquet file.
//! Partition values live in the directory names, so the partition columns
//! are projected out of the file contents.

use arrow::array::{Array, AsArray, RecordBatch, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::Int32Type;
use opendal::Operator;
use std::collections::HashMap;
use tracing::{debug, info};

use super::encoding::encode_parquet;
use super::error::{Result, WriterError};
use super::partition::{partition_path, PARTITION_COLUMNS};

/// One Parquet file written under the bronze prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPartition {
    pub ano: i32,
    pub mes: i32,
    pub path: String,
    pub rows: usize,
    pub bytes: usize,
}

#[derive(Clone)]
pub struct PartitionedWriter {
    operator: Operator,
    prefix: String,
}

impl PartitionedWriter {
    pub fn new(operator: Operator, prefix: &str) -> Self {
        Self {
            operator,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Write `batch` partitioned by its `ano` and `mes` columns.
    ///
    /// Partitions are written in order of first appearance. A batch with no
    /// rows writes nothing.
    pub async fn write(&self, batch: &RecordBatch) -> Result<Vec<WrittenPartition>> {
        if batch.num_rows() == 0 {
            return Ok(Vec::new());
        }

        let groups = group_rows(batch)?;
        let data = project_data_columns(batch)?;

        let mut written = Vec::with_capacity(groups.len());
        for ((ano, mes), rows) in groups {
            let indices = UInt32Array::from(rows);
            let part = take_record_batch(&data, &indices)
                .map_err(|e| WriterError::encode_failure(e.to_string()))?;

            let (bytes, hash) = encode_parquet(&part)?;
            let path = partition_path(&self.prefix, ano, mes, &hash);
            let size = bytes.len();

            debug!(ano, mes, path = %path, rows = part.num_rows(), "Writing partition");

            self.operator
                .write(&path, bytes)
                .await
                .map_err(|e| WriterError::write_failure(&path, e.to_string()))?;

            info!(
                "✓ Wrote {} rows to '{}' ({} bytes)",
                part.num_rows(),
                path,
                size
            );

            written.push(WrittenPartition {
                ano,
                mes,
                path,
                rows: part.num_rows(),
                bytes: size,
            });
        }

        Ok(written)
    }
}

/// Row indices per `(ano, mes)` key, in first-appearance order.
fn group_rows(batch: &RecordBatch) -> Result<Vec<((i32, i32), Vec<u32>)>> {
    let [ano_name, mes_name] = PARTITION_COLUMNS;
    let ano = partition_column(batch, ano_name)?;
    let mes = partition_column(batch, mes_name)?;

    let mut order: Vec<((i32, i32), Vec<u32>)> = Vec::new();
    let mut index: HashMap<(i32, i32), usize> = HashMap::new();

    for row in 0..batch.num_rows() {
        let key = (ano.value(row), mes.value(row));
        let slot = *index.entry(key).or_insert_with(|| {
            order.push((key, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(row as u32);
    }

    Ok(order)
}

fn partition_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a arrow::array::PrimitiveArray<Int32Type>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| WriterError::invalid_partition(name, "column not found"))?;

    let values = column
        .as_primitive_opt::<Int32Type>()
        .ok_or_else(|| {
            WriterError::invalid_partition(
                name,
                format!("expected Int32, found {}", column.data_type()),
            )
        })?;

    if values.null_count() > 0 {
        return Err(WriterError::invalid_partition(
            name,
            format!("{} null values", values.null_count()),
        ));
    }

    Ok(values)
}

fn project_data_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !PARTITION_COLUMNS.contains(&field.name().as_str()))
        .map(|(i, _)| i)
        .collect();

    batch
        .project(&keep)
        .map_err(|e| WriterError::encode_failure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use opendal::services;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;

    fn memory_writer() -> PartitionedWriter {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        PartitionedWriter::new(op, "bronze")
    }

    fn batch(orgaos: Vec<&str>, anos: Vec<i32>, meses: Vec<Option<i32>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("orgao", DataType::Utf8, true),
            Field::new("ano", DataType::Int32, true),
            Field::new("mes", DataType::Int32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(orgaos)),
                Arc::new(Int32Array::from(anos)),
                Arc::new(Int32Array::from(meses)),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn splits_rows_by_partition_in_first_seen_order() {
        let writer = memory_writer();
        let input = batch(
            vec!["a", "b", "c", "d"],
            vec![2024, 2023, 2024, 2024],
            vec![Some(3), Some(12), Some(3), Some(4)],
        );

        let written = writer.write(&input).await.unwrap();
        let keys: Vec<(i32, i32, usize)> =
            written.iter().map(|p| (p.ano, p.mes, p.rows)).collect();
        assert_eq!(keys, vec![(2024, 3, 2), (2023, 12, 1), (2024, 4, 1)]);
        assert!(written[0].path.starts_with("bronze/ano=2024/mes=3/part-"));
        assert!(written[1].path.starts_with("bronze/ano=2023/mes=12/part-"));

        let bytes = writer
            .operator()
            .read(&written[0].path)
            .await
            .unwrap()
            .to_bytes();
        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["orgao"]);

        let orgaos = batches[0].column(0).as_string::<i32>();
        assert_eq!(orgaos.value(0), "a");
        assert_eq!(orgaos.value(1), "c");
    }

    #[tokio::test]
    async fn identical_data_reuses_the_same_path() {
        let writer = memory_writer();
        let input = batch(vec!["a"], vec![2024], vec![Some(1)]);

        let first = writer.write(&input).await.unwrap();
        let second = writer.write(&input).await.unwrap();
        assert_eq!(first[0].path, second[0].path);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let writer = memory_writer();
        let input = batch(vec![], vec![], vec![]);
        assert!(writer.write(&input).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn null_partition_values_are_rejected() {
        let writer = memory_writer();
        let input = batch(vec!["a"], vec![2024], vec![None]);
        let err = writer.write(&input).await.unwrap_err();
        assert!(matches!(err, WriterError::InvalidPartition { .. }));
    }

    #[tokio::test]
    async fn missing_partition_column_is_rejected() {
        let writer = memory_writer();
        let schema = Arc::new(Schema::new(vec![Field::new("orgao", DataType::Utf8, true)]));
        let input =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["a"]))]).unwrap();

        let err = writer.write(&input).await.unwrap_err();
        assert_eq!(err.code(), "E001");
    }
}
