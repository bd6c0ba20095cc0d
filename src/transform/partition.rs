//! Partition key derivation.
//!
//! Picks how `ano`/`mes` are obtained for a table (first matching rule wins):
//! 1. the first date-like column, parsed per row;
//! 2. existing `ano` and `mes` columns, read as integers;
//! 3. the clock's current year and month for every row.

use chrono::{DateTime, Datelike, Utc};
use std::fmt;

use super::dates::{is_date_like, parse_date};
use super::schema::{integer_value, TableSchema};
use crate::writer::PARTITION_COLUMNS;
use crate::Record;

/// Source of "now" for the fallback partition.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionRule {
    /// Derived from the named date column.
    DateColumn(String),
    /// Taken from `ano`/`mes` already present in the records.
    ExistingColumns,
    /// Every row gets the given year and month.
    Clock { ano: i32, mes: i32 },
}

impl fmt::Display for PartitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRule::DateColumn(column) => write!(f, "date column '{}'", column),
            PartitionRule::ExistingColumns => write!(f, "existing ano/mes columns"),
            PartitionRule::Clock { ano, mes } => write!(f, "clock ({}-{:02})", ano, mes),
        }
    }
}

/// Choose the partition rule for an inferred schema.
pub fn select_rule(schema: &TableSchema, clock: &dyn Clock) -> PartitionRule {
    if let Some(column) = schema.names().find(|name| is_date_like(name)) {
        return PartitionRule::DateColumn(column.to_string());
    }

    let [ano, mes] = PARTITION_COLUMNS;
    if schema.column(ano).is_some() && schema.column(mes).is_some() {
        return PartitionRule::ExistingColumns;
    }

    let now = clock.now();
    PartitionRule::Clock {
        ano: now.year(),
        mes: now.month() as i32,
    }
}

/// Partition key of one record, or `None` when the record must be dropped.
pub fn partition_key(rule: &PartitionRule, record: &Record) -> Option<(i32, i32)> {
    match rule {
        PartitionRule::DateColumn(column) => {
            let dt = parse_date(record.get(column)?)?;
            Some((dt.year(), dt.month() as i32))
        }
        PartitionRule::ExistingColumns => {
            let [ano, mes] = PARTITION_COLUMNS;
            let ano = record.get(ano).and_then(integer_value)?;
            let mes = record.get(mes).and_then(integer_value)?;
            Some((ano, mes))
        }
        PartitionRule::Clock { ano, mes } => Some((*ano, *mes)),
    }
}
