// Raw records → partitioned bronze table
//
// The schema is inferred from the full record set, the partition key is
// derived once per row and the resulting batch is handed to the writer.

mod dates;
mod partition;
mod schema;

pub use dates::{is_date_like, parse_date};
pub use partition::{partition_key, select_rule, Clock, FixedClock, PartitionRule, SystemClock};
pub use schema::{build_column, infer_schema, ColumnSpec, ColumnType, TableSchema};

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, RecordBatch};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::writer::{PartitionedWriter, WrittenPartition, PARTITION_COLUMNS};
use crate::Record;

/// Result of one transform run.
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub input_rows: usize,
    pub written_rows: usize,
    pub dropped_rows: usize,
    /// `None` when there was nothing to transform
    pub rule: Option<PartitionRule>,
    pub partitions: Vec<WrittenPartition>,
}

/// Records converted to a single Arrow batch carrying `ano`/`mes`.
#[derive(Debug, Clone)]
pub struct PartitionedTable {
    pub batch: RecordBatch,
    pub schema: TableSchema,
    pub rule: PartitionRule,
    pub dropped_rows: usize,
}

pub struct Transformer {
    writer: PartitionedWriter,
    clock: Arc<dyn Clock>,
}

impl Transformer {
    pub fn new(writer: PartitionedWriter) -> Self {
        Self {
            writer,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn writer(&self) -> &PartitionedWriter {
        &self.writer
    }

    /// Build the partitioned table without writing it.
    ///
    /// Rows whose partition key cannot be derived are dropped. The date
    /// column of the date rule is stored as a timestamp; `ano` and `mes`
    /// replace any existing columns of that name in place.
    pub fn build_table(&self, records: &[Record]) -> Result<PartitionedTable> {
        let mut schema = infer_schema(records);
        let rule = select_rule(&schema, self.clock.as_ref());
        debug!(rule = %rule, columns = schema.columns().len(), "Selected partition rule");

        let mut rows: Vec<&Record> = Vec::with_capacity(records.len());
        let mut anos: Vec<i32> = Vec::with_capacity(records.len());
        let mut meses: Vec<i32> = Vec::with_capacity(records.len());
        for record in records {
            if let Some((ano, mes)) = partition_key(&rule, record) {
                rows.push(record);
                anos.push(ano);
                meses.push(mes);
            }
        }
        let dropped_rows = records.len() - rows.len();

        if let PartitionRule::DateColumn(column) = &rule {
            schema.upsert(ColumnSpec {
                name: column.clone(),
                data_type: ColumnType::Timestamp,
                nullable: false,
            });
        }
        for name in PARTITION_COLUMNS {
            schema.upsert(ColumnSpec {
                name: name.to_string(),
                data_type: ColumnType::Int32,
                nullable: false,
            });
        }

        let [ano_name, mes_name] = PARTITION_COLUMNS;
        let mut anos = Some(anos);
        let mut meses = Some(meses);
        let columns: Vec<ArrayRef> = schema
            .columns()
            .iter()
            .map(|spec| match spec.name.as_str() {
                name if name == ano_name => {
                    Arc::new(Int32Array::from(anos.take().unwrap_or_default())) as ArrayRef
                }
                name if name == mes_name => {
                    Arc::new(Int32Array::from(meses.take().unwrap_or_default())) as ArrayRef
                }
                _ => build_column(&rows, spec),
            })
            .collect();

        let batch = RecordBatch::try_new(schema.to_arrow(), columns)
            .context("Failed to assemble record batch")?;

        Ok(PartitionedTable {
            batch,
            schema,
            rule,
            dropped_rows,
        })
    }

    /// Convert `records` and write them as Hive-partitioned Parquet.
    ///
    /// An empty input writes nothing, and so do records holding no fields
    /// besides `ano`/`mes`.
    pub async fn transform(&self, records: &[Record]) -> Result<TransformReport> {
        if records.is_empty() {
            warn!("No records to transform");
            return Ok(TransformReport::default());
        }

        let table = self.build_table(records)?;
        if table.dropped_rows > 0 {
            warn!(
                dropped = table.dropped_rows,
                rule = %table.rule,
                "Dropped rows without a usable partition key"
            );
        }

        let data_columns = table
            .schema
            .names()
            .filter(|name| !PARTITION_COLUMNS.contains(name))
            .count();
        if data_columns == 0 {
            warn!(
                records = records.len(),
                "Records carry no data columns, nothing to transform"
            );
            return Ok(TransformReport {
                input_rows: records.len(),
                dropped_rows: table.dropped_rows,
                rule: Some(table.rule),
                ..Default::default()
            });
        }

        let partitions = self
            .writer
            .write(&table.batch)
            .await
            .with_context(|| format!("Failed to write bronze layer '{}'", self.writer.prefix()))?;

        let written_rows = partitions.iter().map(|p| p.rows).sum();
        info!(
            "✓ Transformed {} records into {} partitions ({} rows written, {} dropped)",
            records.len(),
            partitions.len(),
            written_rows,
            table.dropped_rows
        );

        Ok(TransformReport {
            input_rows: records.len(),
            written_rows,
            dropped_rows: table.dropped_rows,
            rule: Some(table.rule),
            partitions,
        })
    }
}
