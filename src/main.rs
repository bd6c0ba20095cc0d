use anyhow::{Context, Result};
use clap::Parser;
use gastos2parquet::{FetchStatus, PipelineConfig, PipelineSummary};
use std::path::PathBuf;
use tracing::{error, info};

/// Fetch paginated spending records and write them as partitioned Parquet
#[derive(Parser)]
#[command(name = "gastos2parquet")]
#[command(version)]
#[command(about = "Fetch paginated spending records and write them as partitioned Parquet", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset root holding the raw/bronze/silver/gold layers
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum number of pages to visit
    #[arg(long, value_name = "N")]
    page_limit: Option<u32>,

    /// Skip the transform when the fetch stops early
    #[arg(long)]
    no_partial: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Load file and env layers; validation waits for the CLI overrides
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_unvalidated(Some(path.as_path()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::load_unvalidated(None).context("Failed to load configuration")?,
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);

    // Step 3: Initialize tracing early so validation warnings show up
    gastos2parquet::init::init_tracing(&config.log);
    config.validate().context("Invalid configuration")?;
    display_startup_info(&config);

    let summary = gastos2parquet::run_pipeline(&config).await?;
    display_summary(&summary);

    if let FetchStatus::Truncated(reason) = &summary.fetch_status {
        if reason.is_fatal() {
            error!("Fetch aborted: {}", reason);
            anyhow::bail!("fetch aborted: {}", reason);
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut PipelineConfig, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.storage.root = output.to_string_lossy().to_string();
    }
    if let Some(limit) = cli.page_limit {
        config.source.page_limit = limit;
    }
    if cli.no_partial {
        config.pipeline.transform_partial = false;
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}

fn display_startup_info(config: &PipelineConfig) {
    info!("╭─────────────────────────────────────────────────");
    info!("│ gastos2parquet v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Endpoint: {}", config.source.endpoint);
    info!(
        "│ Token: {}",
        if config.source.token.is_some() {
            "configured"
        } else {
            "none"
        }
    );
    info!("│ Page limit: {}", config.source.page_limit);
    info!("│ Dataset root: {}", config.storage.root);
    info!(
        "│ Backoff: {} ({} ms, {} retries)",
        config.rate_limit.strategy,
        config.rate_limit.initial_backoff_ms,
        config.rate_limit.max_retries
    );
    info!("╰─────────────────────────────────────────────────");
}

fn display_summary(summary: &PipelineSummary) {
    info!(
        "Fetch {}: {} records ({} pages cached, {} fetched)",
        summary.fetch_status,
        summary.records_fetched,
        summary.pages_from_cache,
        summary.pages_from_network
    );
    match &summary.transform {
        Some(report) => info!(
            "Bronze: {} rows in {} partitions, {} dropped",
            report.written_rows,
            report.partitions.len(),
            report.dropped_rows
        ),
        None => info!("Bronze: transform skipped"),
    }
}
