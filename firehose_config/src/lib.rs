pub mod config;
pub mod parser;

pub use config::{ExporterConfig, FilterConfig, IngestConfig, MetricsConfig, WebConfig};
pub use parser::{parse_config_from_file, ConfigFormat};
