// gastos2parquet - raw → bronze ingestion for paginated spending records
//
// Fetch: walk the remote page chain, caching every page under the raw layer
// so an interrupted crawl resumes where it stopped.
// Transform: infer a schema from the aggregated records, derive the
// `ano`/`mes` partition key and write Hive-partitioned Parquet to bronze.

use anyhow::Result;
use tracing::{info, warn};

pub mod config;
pub mod fetch;
pub mod init;
pub mod transform;
pub mod writer;

pub use config::PipelineConfig;
pub use fetch::{
    FetchError, FetchOutcome, FetchStatus, Fetcher, HttpPageSource, PageCache, PageResponse,
    PageSource, TransportError, TruncationReason,
};
pub use transform::{Clock, PartitionRule, SystemClock, TransformReport, Transformer};
pub use writer::{PartitionedWriter, WrittenPartition};

/// One spending entry as returned by the remote API, in source key order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// What a pipeline run did, end to end.
#[derive(Debug)]
pub struct PipelineSummary {
    pub fetch_status: FetchStatus,
    pub records_fetched: usize,
    pub pages_from_cache: u32,
    pub pages_from_network: u32,
    /// `None` when the transform was skipped
    pub transform: Option<TransformReport>,
}

/// Run the full pipeline from a loaded configuration: bootstrap the dataset
/// layout, fetch every reachable page and transform the result into bronze.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineSummary> {
    let operator = init::init_storage(&config.storage)?;
    init::bootstrap_layout(&operator, &config.storage).await?;

    let source = HttpPageSource::new(&config.source)?;
    let cache = PageCache::new(operator.clone(), &config.storage.raw_dir);
    let fetcher = Fetcher::new(source, cache, &config.source, &config.rate_limit);

    let writer = PartitionedWriter::new(operator, &config.storage.bronze_dir);
    let transformer = Transformer::new(writer);

    run_stages(&fetcher, &transformer, config.pipeline.transform_partial).await
}

/// Sequence fetch → transform with explicit handling of truncated fetches.
pub async fn run_stages<S: PageSource>(
    fetcher: &Fetcher<S>,
    transformer: &Transformer,
    transform_partial: bool,
) -> Result<PipelineSummary> {
    let outcome = fetcher.fetch_all().await?;

    info!(
        records = outcome.records.len(),
        pages_from_cache = outcome.pages_from_cache,
        pages_from_network = outcome.pages_from_network,
        status = %outcome.status,
        "Fetch finished"
    );

    let run_transform = match &outcome.status {
        FetchStatus::Complete => true,
        FetchStatus::Truncated(reason) if transform_partial => {
            warn!(reason = %reason, "Fetch truncated; transforming partial data");
            true
        }
        FetchStatus::Truncated(reason) => {
            warn!(reason = %reason, "Fetch truncated; skipping transform");
            false
        }
    };

    let transform = if run_transform {
        Some(transformer.transform(&outcome.records).await?)
    } else {
        None
    };

    Ok(PipelineSummary {
        records_fetched: outcome.records.len(),
        pages_from_cache: outcome.pages_from_cache,
        pages_from_network: outcome.pages_from_network,
        fetch_status: outcome.status,
        transform,
    })
}
