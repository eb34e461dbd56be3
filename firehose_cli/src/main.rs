mod commands;
mod source;
mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "firehose-exporter")]
#[command(about = "Prometheus exporter for Cloud Foundry Firehose envelopes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest envelopes and serve the scrape endpoint
    Serve {
        /// Path to config file (YAML, TOML, or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Newline-delimited JSON envelopes to ingest (stdin when omitted)
        #[arg(short, long)]
        envelopes: Option<PathBuf>,

        /// Override the configured listen address
        #[arg(short, long)]
        listen_address: Option<String>,
    },

    /// Ingest an envelope file once and print the resulting scrape
    Replay {
        /// Newline-delimited JSON envelopes
        envelope_file: PathBuf,

        /// Path to config file (YAML, TOML, or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (prometheus, json)
        #[arg(short, long, default_value = "prometheus")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a config file
    Validate {
        /// Path to config file
        config_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match cli.command {
        Commands::Serve {
            config,
            envelopes,
            listen_address,
        } => {
            commands::serve::execute(config, envelopes, listen_address).await?;
        }

        Commands::Replay {
            envelope_file,
            config,
            format,
            output,
        } => {
            commands::replay::execute(envelope_file, config, format, output).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }
    }

    Ok(())
}
