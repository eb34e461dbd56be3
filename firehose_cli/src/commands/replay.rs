use super::{build_store, load_config};
use crate::{source, ui};
use anyhow::Result;
use firehose_metrics::exporters::{JsonExporter, PrometheusExporter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn execute(
    envelope_file: PathBuf,
    config_file: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_file).await?;
    let store = Arc::new(build_store(&config)?);

    let reader = source::open(Some(envelope_file.as_path())).await?;
    let count = source::replay(reader, &store).await?;
    ui::print_replay_summary(&envelope_file, count, &store.get_internal_metrics());

    let rendered = match format.as_str() {
        "prometheus" => {
            PrometheusExporter::new(config.namespace.as_str(), store.clone())?
                .render()
                .await?
        }
        "json" => {
            let exporter = JsonExporter::new(store.clone());
            if let Some(output_path) = &output {
                exporter.export(output_path).await?;
                return Ok(());
            }
            exporter.to_string().await?
        }
        _ => {
            anyhow::bail!("Unknown format: {}", format);
        }
    };

    if let Some(output_path) = output {
        info!("Writing {} output to {}", format, output_path.display());
        tokio::fs::write(output_path, rendered).await?;
    } else {
        println!("{}", rendered);
    }

    Ok(())
}
