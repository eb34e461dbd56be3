use crate::config::ExporterConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Serialization formats a config file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => anyhow::bail!(
                "Unsupported config file '{}'. Use .yaml, .yml, .toml, or .json",
                path.display()
            ),
        }
    }

    /// Deserializes and validates a config. Missing sections take defaults.
    pub fn parse(self, content: &str) -> Result<ExporterConfig> {
        let config: ExporterConfig = match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }
}

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    debug!("Parsing config {} as {:?}", path.display(), format);
    format
        .parse(&contents)
        .with_context(|| format!("invalid config {}", path.display()))
}
