//! Incentive batch runner
//!
//! Reads activity configs and contract batches from JSON, processes every
//! activity and writes the resulting records and summaries.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use incentive_common::ConfigRegistry;
use incentive_ledger::{FactStore, InMemoryFactStore, SqliteFactStore};
use incentive_pipeline::{
    ActivityBatch, BatchOutcome, PipelineMetrics, PipelineSettings, RewardPipeline, StoreBackend,
};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = PipelineSettings::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    info!("Starting incentive pipeline v{}", incentive_common::VERSION);
    info!("Loaded settings: {:?}", settings);

    let configs = ConfigRegistry::from_path(&settings.activity_config_path).with_context(|| {
        format!(
            "failed to load activity configs from {}",
            settings.activity_config_path.display()
        )
    })?;
    info!("Registered {} activity configs: {:?}", configs.len(), configs.keys());

    let store: Arc<dyn FactStore> = match settings.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryFactStore::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteFactStore::open(&settings.store.sqlite_path).with_context(|| {
                format!("failed to open {}", settings.store.sqlite_path.display())
            })?,
        ),
    };
    info!("Using {} fact store", store.backend_name());

    let registry = Registry::new();
    let metrics = Arc::new(PipelineMetrics::new()?);
    metrics.register(&registry)?;

    let input = std::fs::read_to_string(&settings.input_path)
        .with_context(|| format!("failed to read {}", settings.input_path.display()))?;
    let batches: Vec<ActivityBatch> =
        serde_json::from_str(&input).context("failed to parse contract batches")?;
    info!("Read {} activity batches", batches.len());

    let pipeline = Arc::new(RewardPipeline::new(store, Arc::new(configs)).with_metrics(metrics));
    let results = pipeline
        .process_activities(batches, settings.max_concurrent_activities)
        .await;

    let mut outcomes: Vec<BatchOutcome> = Vec::with_capacity(results.len());
    for (code, result) in results {
        match result {
            Ok(outcome) => {
                let s = &outcome.summary;
                info!(
                    "{}: received={} succeeded={} duplicate={} invalid={} failed={} rewards={} value={}",
                    code,
                    s.received,
                    s.succeeded,
                    s.skipped_duplicate,
                    s.skipped_invalid,
                    s.failed,
                    s.rewards_awarded,
                    s.reward_value_total
                );
                outcomes.push(outcome);
            }
            Err(err) => warn!("{}: batch not processed: {}", code, err),
        }
    }

    let rendered = serde_json::to_string_pretty(&outcomes)?;
    match &settings.output_path {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {} batch outcomes to {}", outcomes.len(), path.display());
        }
        None => println!("{}", rendered),
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    info!("Metrics:\n{}", String::from_utf8_lossy(&buffer));

    Ok(())
}
