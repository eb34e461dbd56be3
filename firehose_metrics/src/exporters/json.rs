use crate::{
    internal::InternalMetrics,
    records::{ContainerMetrics, CounterEvents, ValueMetrics},
    store::MetricStore,
};
use firehose_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Internal counters plus every retained record, as read at one moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub internal: InternalMetrics,
    pub container_metrics: ContainerMetrics,
    pub counter_events: CounterEvents,
    pub value_metrics: ValueMetrics,
}

/// Dumps a [`MetricStore`] as pretty-printed JSON.
pub struct JsonExporter {
    store: Arc<MetricStore>,
}

impl JsonExporter {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }

    /// Records are sorted by name so repeated dumps diff cleanly.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let mut container_metrics = self.store.get_container_metrics().await;
        container_metrics.sort_by(|a, b| {
            (&a.application_id, a.instance_index).cmp(&(&b.application_id, b.instance_index))
        });
        let mut counter_events = self.store.get_counter_events().await;
        counter_events.sort_by(|a, b| a.name.cmp(&b.name));
        let mut value_metrics = self.store.get_value_metrics().await;
        value_metrics.sort_by(|a, b| a.name.cmp(&b.name));

        StoreSnapshot {
            internal: self.store.get_internal_metrics(),
            container_metrics,
            counter_events,
            value_metrics,
        }
    }

    pub async fn to_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot().await)?)
    }

    pub async fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_string().await?;
        tokio::fs::write(path, json).await?;
        info!("Wrote store snapshot to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use firehose_core::{CounterEventPayload, Envelope};
    use std::time::Duration;

    async fn store() -> Arc<MetricStore> {
        let store = Arc::new(MetricStore::allow_all(StoreConfig {
            expiration: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }));
        for name in ["b", "a"] {
            store
                .add_metric(
                    &Envelope::builder()
                        .origin("o")
                        .counter_event(CounterEventPayload {
                            name: name.to_string(),
                            delta: 1,
                            total: 2,
                        })
                        .build(),
                )
                .await;
        }
        store.alert_slow_consumer_error();
        store
    }

    #[tokio::test]
    async fn test_snapshot_json() {
        let exporter = JsonExporter::new(store().await);

        let json = exporter.to_string().await.unwrap();
        assert!(json.contains("\"total_envelopes_received\": 2"));
        assert!(json.contains("\"slow_consumer_alert\": true"));

        let parsed: StoreSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.internal.total_counter_events_processed, 2);
        assert_eq!(parsed.counter_events[0].name, "a");
        assert_eq!(parsed.counter_events[1].name, "b");
        assert!(parsed.value_metrics.is_empty());
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let store = store().await;
        let path = std::env::temp_dir().join(format!(
            "firehose_snapshot_{}.json",
            std::process::id()
        ));

        JsonExporter::new(store.clone()).export(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: StoreSnapshot = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.internal, store.get_internal_metrics());
        assert_eq!(parsed.counter_events.len(), 2);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
