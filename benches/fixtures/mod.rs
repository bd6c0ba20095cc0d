// Synthetic spending records for benchmarking
//
// Mimics the shape of the remote dataset: a date column, a handful of text
// columns and a numeric amount, with an occasional unparsable date.

use gastos2parquet::Record;
use serde_json::{json, Value};

/// Workload size presets
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum WorkloadSize {
    Small,  // 1k records (one page)
    Medium, // 50k records
    Large,  // 500k records
}

impl WorkloadSize {
    pub fn record_count(&self) -> usize {
        match self {
            WorkloadSize::Small => 1_000,
            WorkloadSize::Medium => 50_000,
            WorkloadSize::Large => 500_000,
        }
    }
}

const ORGAOS: [&str; 5] = [
    "Ministério da Saúde",
    "Ministério da Educação",
    "Ministério da Defesa",
    "Ministério da Economia",
    "Ministério da Justiça",
];

/// Generate `size` records spread over 24 months.
pub fn generate_records(size: WorkloadSize) -> Vec<Record> {
    (0..size.record_count())
        .map(|i| {
            let month = i % 24;
            let date = if i % 97 == 0 {
                Value::String("sem data".to_string())
            } else {
                Value::String(format!(
                    "{}-{:02}-{:02}",
                    2022 + month / 12,
                    month % 12 + 1,
                    i % 28 + 1
                ))
            };

            let value = json!({
                "orgao_superior": ORGAOS[i % ORGAOS.len()],
                "nome_favorecido": format!("Favorecido {}", i % 1_000),
                "documento": format!("2024NE{:06}", i),
                "data_pagamento": date,
                "valor": (i % 10_000) as f64 * 1.37,
            });

            match value {
                Value::Object(map) => map,
                _ => Record::new(),
            }
        })
        .collect()
}
