use crate::ui;
use anyhow::Result;
use firehose_config::parse_config_from_file;
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    ui::print_banner("Validating Config");
    println!("File: {}", config_file.display());
    println!();

    let config = match parse_config_from_file(&config_file).await {
        Ok(config) => config,
        Err(e) => {
            ui::print_verdict(false, "Config is invalid!");
            println!("\nError: {:#}", e);
            return Err(e);
        }
    };

    ui::print_verdict(true, "Config is valid!");
    println!();
    ui::print_field("Namespace", &config.namespace);
    ui::print_field("Expiration", humanize(config.metrics.expiration));
    ui::print_field("Cleanup interval", humanize(config.metrics.cleanup_interval));
    ui::print_field("Flush after scrape", config.metrics.flush_after_scrape);
    ui::print_field(
        "Listen",
        format!("{}{}", config.web.listen_address, config.web.telemetry_path),
    );
    ui::print_field("Ingest buffer", config.ingest.buffer_size);
    ui::print_allow_list("Deployments", &config.filters.deployments);
    ui::print_allow_list("Events", &config.filters.events);

    if config.metrics.expiration.is_zero() {
        ui::print_caveat("Container metrics and the slow consumer alert never expire");
    }
    if config.metrics.cleanup_interval.is_zero() {
        ui::print_caveat("Expired metrics are never swept");
    }

    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    if duration.is_zero() {
        "never".to_string()
    } else {
        format!("{:?}", duration)
    }
}
