pub mod replay;
pub mod serve;
pub mod validate;

use anyhow::Result;
use firehose_config::{parse_config_from_file, ExporterConfig};
use firehose_metrics::MetricStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn load_config(config_file: Option<PathBuf>) -> Result<ExporterConfig> {
    match config_file {
        Some(path) => {
            info!("Loading config: {}", path.display());
            parse_config_from_file(&path).await
        }
        None => {
            info!("No config file given, using defaults");
            Ok(ExporterConfig::default())
        }
    }
}

pub fn build_store(config: &ExporterConfig) -> Result<MetricStore> {
    let event_filter = config.event_filter()?;
    Ok(MetricStore::new(
        config.store_config(),
        Arc::new(config.deployment_filter()),
        Arc::new(event_filter),
    ))
}
