use crate::{
    cache::{Retention, TtlCache},
    internal::{InternalCounters, InternalMetrics, KindCounters},
    records::{ContainerMetric, ContainerMetrics, CounterEvent, CounterEvents, ValueMetric, ValueMetrics},
};
use chrono::Utc;
use firehose_core::{
    DeploymentAllowList, DynDeploymentFilter, DynEventFilter, Envelope, EventType,
    EventTypeAllowList,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Default TTL for container metrics and the slow-consumer alert.
    /// Zero disables expiry.
    pub expiration: Duration,
    /// Sweep period for expired entries. Zero disables the sweepers.
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(10 * 60),
            cleanup_interval: Duration::from_secs(3 * 60),
        }
    }
}

/// Dedup key for an envelope: source identity followed by the metric identity.
pub fn metric_key(envelope: &Envelope) -> String {
    let mut key = String::with_capacity(
        envelope.origin.len()
            + envelope.deployment.len()
            + envelope.job.len()
            + envelope.index.len()
            + envelope.ip.len()
            + 32,
    );

    key.push_str(&envelope.origin);
    key.push_str(&envelope.deployment);
    key.push_str(&envelope.job);
    key.push_str(&envelope.index);
    key.push_str(&envelope.ip);

    match envelope.event_type {
        EventType::ContainerMetric => {
            let payload = envelope.container_metric.as_ref();
            key.push_str(payload.map(|p| p.application_id.as_str()).unwrap_or_default());
            key.push_str(&payload.map(|p| p.instance_index).unwrap_or_default().to_string());
        }
        EventType::CounterEvent => {
            key.push_str(
                envelope
                    .counter_event
                    .as_ref()
                    .map(|p| p.name.as_str())
                    .unwrap_or_default(),
            );
        }
        EventType::ValueMetric => {
            key.push_str(
                envelope
                    .value_metric
                    .as_ref()
                    .map(|p| p.name.as_str())
                    .unwrap_or_default(),
            );
        }
        _ => {}
    }

    key
}

/// In-memory store for firehose metrics and the nozzle's own counters.
///
/// The three record caches and the internal counters are independent: a
/// writer on one kind never waits on another. Dropping the store stops any
/// sweepers it spawned.
pub struct MetricStore {
    config: StoreConfig,
    deployment_filter: DynDeploymentFilter,
    event_filter: DynEventFilter,
    internal: Arc<InternalCounters>,
    container_metrics: Arc<TtlCache<ContainerMetric>>,
    counter_events: Arc<TtlCache<CounterEvent>>,
    value_metrics: Arc<TtlCache<ValueMetric>>,
    shutdown: CancellationToken,
}

impl MetricStore {
    pub fn new(
        config: StoreConfig,
        deployment_filter: DynDeploymentFilter,
        event_filter: DynEventFilter,
    ) -> Self {
        Self {
            config,
            deployment_filter,
            event_filter,
            internal: Arc::new(InternalCounters::new(config.expiration)),
            container_metrics: Arc::new(TtlCache::new("container metrics", config.expiration)),
            counter_events: Arc::new(TtlCache::new("counter events", config.expiration)),
            value_metrics: Arc::new(TtlCache::new("value metrics", config.expiration)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Store that retains every deployment and every metric kind.
    pub fn allow_all(config: StoreConfig) -> Self {
        Self::new(
            config,
            Arc::new(DeploymentAllowList::allow_all()),
            Arc::new(EventTypeAllowList::allow_all()),
        )
    }

    /// Spawns one sweeper per cache on the current runtime.
    ///
    /// Returns no handles when the cleanup interval is zero.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        let interval = self.config.cleanup_interval;
        if interval.is_zero() {
            warn!("Cleanup interval is zero, expired metrics are only filtered on read");
            return Vec::new();
        }

        info!("Sweeping expired metrics every {:?}", interval);

        let internal = self.internal.clone();
        let shutdown = self.shutdown.clone();
        let alert_sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if internal.clear_expired_alert() {
                            debug!("Slow consumer alert expired");
                        }
                    }
                }
            }
        });

        vec![
            self.container_metrics
                .clone()
                .spawn_sweeper(interval, self.shutdown.child_token()),
            self.counter_events
                .clone()
                .spawn_sweeper(interval, self.shutdown.child_token()),
            self.value_metrics
                .clone()
                .spawn_sweeper(interval, self.shutdown.child_token()),
            alert_sweeper,
        ]
    }

    pub fn get_internal_metrics(&self) -> InternalMetrics {
        self.internal.snapshot()
    }

    /// Overwrites every internal counter. A raised alert is re-armed with the
    /// default TTL; the other fields never expire.
    pub fn set_internal_metrics(&self, metrics: InternalMetrics) {
        self.internal.overwrite(&metrics);
    }

    pub fn alert_slow_consumer_error(&self) {
        self.internal.raise_slow_consumer_alert();
    }

    pub async fn add_metric(&self, envelope: &Envelope) {
        let now = Utc::now().timestamp();
        self.internal.envelope_received(now);

        match envelope.event_type {
            EventType::ContainerMetric => {
                if self.accept(envelope, &self.internal.container_metrics, now) {
                    self.container_metrics
                        .set(
                            metric_key(envelope),
                            ContainerMetric::from_envelope(envelope),
                            Retention::Default,
                        )
                        .await;
                }
            }
            EventType::CounterEvent => {
                if self.accept(envelope, &self.internal.counter_events, now) {
                    self.counter_events
                        .set(
                            metric_key(envelope),
                            CounterEvent::from_envelope(envelope),
                            Retention::Never,
                        )
                        .await;
                }
            }
            EventType::ValueMetric => {
                if self.accept(envelope, &self.internal.value_metrics, now) {
                    self.value_metrics
                        .set(
                            metric_key(envelope),
                            ValueMetric::from_envelope(envelope),
                            Retention::Never,
                        )
                        .await;
                }
            }
            other => trace!("Counting {} envelope without storing it", other),
        }
    }

    /// Records the metric as received and reports whether both filters let
    /// it through, in which case it is also counted as processed.
    fn accept(&self, envelope: &Envelope, kind: &KindCounters, now: i64) -> bool {
        self.internal.metric_received(kind, now);

        let enabled = self.deployment_filter.enabled(&envelope.deployment)
            && self.event_filter.enabled(envelope);
        if enabled {
            self.internal.metric_processed(kind);
        }
        enabled
    }

    pub async fn get_container_metrics(&self) -> ContainerMetrics {
        self.container_metrics.values().await
    }

    pub async fn flush_container_metrics(&self) {
        self.container_metrics.flush().await;
    }

    pub async fn get_counter_events(&self) -> CounterEvents {
        self.counter_events.values().await
    }

    pub async fn flush_counter_events(&self) {
        self.counter_events.flush().await;
    }

    pub async fn get_value_metrics(&self) -> ValueMetrics {
        self.value_metrics.values().await
    }

    pub async fn flush_value_metrics(&self) {
        self.value_metrics.flush().await;
    }

    /// Returns the live container metrics and empties the cache in one step.
    pub async fn drain_container_metrics(&self) -> ContainerMetrics {
        self.container_metrics.drain().await
    }

    pub async fn drain_counter_events(&self) -> CounterEvents {
        self.counter_events.drain().await
    }

    pub async fn drain_value_metrics(&self) -> ValueMetrics {
        self.value_metrics.drain().await
    }
}

impl Drop for MetricStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
