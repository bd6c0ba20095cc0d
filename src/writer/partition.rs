//! Partition path generation for the bronze layer
//!
//! Generates Hive-style partition paths:
//! {prefix}/ano={ano}/mes={mes}/part-{hash}.parquet

/// Partition columns, outermost directory first.
pub const PARTITION_COLUMNS: [&str; 2] = ["ano", "mes"];

/// Generate the path of one partition file.
///
/// The file name uses the first 16 hex characters of the content hash, so
/// identical data always lands on the same path.
pub fn partition_path(prefix: &str, ano: i32, mes: i32, hash_hex: &str) -> String {
    let hash_prefix = if hash_hex.len() >= 16 {
        &hash_hex[..16]
    } else {
        hash_hex
    };

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("ano={}/mes={}/part-{}.parquet", ano, mes, hash_prefix)
    } else {
        format!("{}/ano={}/mes={}/part-{}.parquet", prefix, ano, mes, hash_prefix)
    }
}
