use firehose_core::{DeploymentAllowList, EventTypeAllowList};
use firehose_metrics::StoreConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Prefix for every exported metric name.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(with = "humantime_serde", default = "default_expiration")]
    pub expiration: Duration,
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
    #[serde(default)]
    pub flush_after_scrape: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Deployments to retain metrics for; empty keeps all.
    #[serde(default)]
    pub deployments: Vec<String>,
    /// Metric kinds to retain; empty keeps all.
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Envelopes buffered between the reader and the store before the
    /// reader starts dropping them and raising the slow consumer alert.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_namespace() -> String {
    "firehose".to_string()
}

fn default_expiration() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(3 * 60)
}

fn default_listen_address() -> String {
    "0.0.0.0:9186".to_string()
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

fn default_buffer_size() -> usize {
    1024
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            metrics: MetricsConfig::default(),
            filters: FilterConfig::default(),
            web: WebConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            expiration: default_expiration(),
            cleanup_interval: default_cleanup_interval(),
            flush_after_scrape: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

impl ExporterConfig {
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::default()
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            expiration: self.metrics.expiration,
            cleanup_interval: self.metrics.cleanup_interval,
        }
    }

    pub fn deployment_filter(&self) -> DeploymentAllowList {
        DeploymentAllowList::new(self.filters.deployments.iter().cloned())
    }

    pub fn event_filter(&self) -> firehose_core::Result<EventTypeAllowList> {
        EventTypeAllowList::new(&self.filters.events)
    }

    pub fn listen_address(&self) -> Result<SocketAddr, String> {
        self.web
            .listen_address
            .parse()
            .map_err(|e| format!("Invalid listen address '{}': {}", self.web.listen_address, e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(first) = self.namespace.chars().next() {
            if first.is_ascii_digit() {
                return Err(format!(
                    "Namespace '{}' must not start with a digit",
                    self.namespace
                ));
            }
        }
        if !self
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "Namespace '{}' may only contain letters, digits and underscores",
                self.namespace
            ));
        }

        self.listen_address()?;

        if !self.web.telemetry_path.starts_with('/') {
            return Err(format!(
                "Telemetry path '{}' must start with '/'",
                self.web.telemetry_path
            ));
        }
        if self.web.telemetry_path == "/health" {
            return Err("Telemetry path '/health' is reserved".to_string());
        }

        if self.ingest.buffer_size == 0 {
            return Err("Ingest buffer size must be > 0".to_string());
        }

        self.event_filter().map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[derive(Default)]
pub struct ExporterConfigBuilder {
    config: ExporterConfig,
}

impl ExporterConfigBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.config.metrics.expiration = expiration;
        self
    }

    pub fn cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.config.metrics.cleanup_interval = cleanup_interval;
        self
    }

    pub fn flush_after_scrape(mut self, flush: bool) -> Self {
        self.config.metrics.flush_after_scrape = flush;
        self
    }

    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.config.filters.deployments.push(deployment.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.config.filters.events.push(event.into());
        self
    }

    pub fn listen_address(mut self, address: impl Into<String>) -> Self {
        self.config.web.listen_address = address.into();
        self
    }

    pub fn telemetry_path(mut self, path: impl Into<String>) -> Self {
        self.config.web.telemetry_path = path.into();
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.ingest.buffer_size = buffer_size;
        self
    }

    pub fn build(self) -> ExporterConfig {
        self.config
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firehose_core::{DeploymentFilter, Envelope, EventFilter, EventType};

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();

        assert_eq!(config.namespace, "firehose");
        assert_eq!(config.metrics.expiration, Duration::from_secs(600));
        assert_eq!(config.metrics.cleanup_interval, Duration::from_secs(180));
        assert!(!config.metrics.flush_after_scrape);
        assert_eq!(config.web.listen_address, "0.0.0.0:9186");
        assert_eq!(config.web.telemetry_path, "/metrics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ExporterConfig::builder()
            .namespace("nozzle")
            .expiration(Duration::from_secs(30))
            .cleanup_interval(Duration::from_secs(5))
            .deployment("cf")
            .event("ValueMetric")
            .build();

        assert_eq!(config.namespace, "nozzle");
        assert_eq!(
            config.store_config(),
            StoreConfig {
                expiration: Duration::from_secs(30),
                cleanup_interval: Duration::from_secs(5),
            }
        );
        assert!(config.deployment_filter().enabled("cf"));
        assert!(!config.deployment_filter().enabled("redis"));

        let events = config.event_filter().unwrap();
        assert!(events.enabled(&Envelope::builder().event_type(EventType::ValueMetric).build()));
        assert!(!events.enabled(&Envelope::builder().event_type(EventType::CounterEvent).build()));
    }

    #[test]
    fn test_validation() {
        assert!(ExporterConfig::builder()
            .namespace("1firehose")
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .namespace("fire-hose")
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .namespace("")
            .build()
            .validate()
            .is_ok());
        assert!(ExporterConfig::builder()
            .listen_address("not an address")
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .telemetry_path("metrics")
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .telemetry_path("/health")
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .buffer_size(0)
            .build()
            .validate()
            .is_err());
        assert!(ExporterConfig::builder()
            .event("HttpStartStop")
            .build()
            .validate()
            .is_err());
    }
}
