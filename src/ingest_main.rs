use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use docchat::core::config::{redacted, AppPaths, ConfigScope, ConfigService};
use docchat::core::logging;
use docchat::llm::OpenAiProvider;
use docchat::rag::{EmbeddingClient, IngestionPipeline};
use docchat::state::build_vector_store;

/// Exit status when some upsert batches failed.
const PARTIAL_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    let paths = Arc::new(AppPaths::new());
    let mut config = ConfigService::new(paths.clone())
        .load(ConfigScope::Ingest)
        .context("Invalid configuration")?;
    if let Some(dir) = std::env::args().nth(1) {
        config.ingest.data_dir = paths.resolve(&PathBuf::from(dir));
    }

    let log_dir = config
        .logging
        .dir
        .clone()
        .unwrap_or_else(|| paths.log_dir.clone());
    logging::init(&log_dir, "docchat-ingest.log", &config.logging.level);
    tracing::info!(config = %redacted(&config), "configuration loaded");

    let openai =
        Arc::new(OpenAiProvider::new(&config.llm).context("Failed to build OpenAI client")?);
    let embedder = EmbeddingClient::from_config(openai, &config.llm, &config.ingest);
    let store = build_vector_store(&config)?;

    let pipeline = IngestionPipeline::new(config.ingest.clone(), embedder, store);
    let report = pipeline
        .run()
        .await
        .with_context(|| format!("Ingestion of {} failed", config.ingest.data_dir.display()))?;

    println!(
        "Ingested {} pages into {} chunks: {}/{} records upserted in {} batches",
        report.documents,
        report.chunks,
        report.upsert.upserted_records(),
        report.upsert.total_records(),
        report.upsert.batches.len()
    );

    if report.upsert.is_complete() {
        return Ok(ExitCode::SUCCESS);
    }
    for batch in report.upsert.failed_batches() {
        if let Err(err) = &batch.result {
            eprintln!("Error in batch {}: {}", batch.ordinal, err.source);
        }
    }
    Ok(ExitCode::from(PARTIAL_FAILURE))
}
