use crate::cache::{expiry_deadline, Retention};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Operational counters about the ingestion process.
///
/// Timestamps are unix seconds; zero means "never".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InternalMetrics {
    pub total_envelopes_received: i64,
    pub last_envelope_received_timestamp: i64,
    pub total_metrics_received: i64,
    pub last_metric_received_timestamp: i64,
    pub total_container_metrics_received: i64,
    pub total_container_metrics_processed: i64,
    pub last_container_metric_received_timestamp: i64,
    pub total_counter_events_received: i64,
    pub total_counter_events_processed: i64,
    pub last_counter_event_received_timestamp: i64,
    pub total_value_metrics_received: i64,
    pub total_value_metrics_processed: i64,
    pub last_value_metric_received_timestamp: i64,
    pub slow_consumer_alert: bool,
    pub last_slow_consumer_alert_timestamp: i64,
}

#[derive(Debug, Default)]
pub(crate) struct KindCounters {
    received: AtomicI64,
    processed: AtomicI64,
    last_received_timestamp: AtomicI64,
}

impl KindCounters {
    fn load(&self) -> (i64, i64, i64) {
        (
            self.received.load(Ordering::Relaxed),
            self.processed.load(Ordering::Relaxed),
            self.last_received_timestamp.load(Ordering::Relaxed),
        )
    }

    fn store(&self, received: i64, processed: i64, last_received_timestamp: i64) {
        self.received.store(received, Ordering::Relaxed);
        self.processed.store(processed, Ordering::Relaxed);
        self.last_received_timestamp
            .store(last_received_timestamp, Ordering::Relaxed);
    }
}

// Alert deadline sentinels, in unix milliseconds.
const ALERT_CLEAR: i64 = 0;
const ALERT_NO_EXPIRY: i64 = i64::MAX;

/// Lock-free backing store for [`InternalMetrics`].
///
/// Counters and timestamps never expire. The slow-consumer flag is kept as a
/// deadline and reads as raised only until the default TTL has passed.
#[derive(Debug)]
pub(crate) struct InternalCounters {
    envelopes_received: AtomicI64,
    last_envelope_received_timestamp: AtomicI64,
    metrics_received: AtomicI64,
    last_metric_received_timestamp: AtomicI64,
    pub(crate) container_metrics: KindCounters,
    pub(crate) counter_events: KindCounters,
    pub(crate) value_metrics: KindCounters,
    slow_consumer_alert_until: AtomicI64,
    last_slow_consumer_alert_timestamp: AtomicI64,
    alert_ttl: Duration,
}

impl InternalCounters {
    pub(crate) fn new(alert_ttl: Duration) -> Self {
        Self {
            envelopes_received: AtomicI64::new(0),
            last_envelope_received_timestamp: AtomicI64::new(0),
            metrics_received: AtomicI64::new(0),
            last_metric_received_timestamp: AtomicI64::new(0),
            container_metrics: KindCounters::default(),
            counter_events: KindCounters::default(),
            value_metrics: KindCounters::default(),
            slow_consumer_alert_until: AtomicI64::new(ALERT_CLEAR),
            last_slow_consumer_alert_timestamp: AtomicI64::new(0),
            alert_ttl,
        }
    }

    pub(crate) fn envelope_received(&self, now: i64) {
        self.envelopes_received.fetch_add(1, Ordering::Relaxed);
        self.last_envelope_received_timestamp
            .fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn metric_received(&self, kind: &KindCounters, now: i64) {
        self.metrics_received.fetch_add(1, Ordering::Relaxed);
        self.last_metric_received_timestamp
            .fetch_max(now, Ordering::Relaxed);
        kind.received.fetch_add(1, Ordering::Relaxed);
        kind.last_received_timestamp.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn metric_processed(&self, kind: &KindCounters) {
        kind.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn raise_slow_consumer_alert(&self) {
        self.arm_alert(true);
        self.last_slow_consumer_alert_timestamp
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn arm_alert(&self, raised: bool) {
        let until = if raised {
            expiry_deadline(self.alert_ttl, Retention::Default).unwrap_or(ALERT_NO_EXPIRY)
        } else {
            ALERT_CLEAR
        };
        self.slow_consumer_alert_until.store(until, Ordering::Relaxed);
    }

    fn alert_raised(&self, now_ms: i64) -> bool {
        let until = self.slow_consumer_alert_until.load(Ordering::Relaxed);
        until != ALERT_CLEAR && now_ms <= until
    }

    /// Resets an alert whose deadline has passed. Returns true if one was cleared.
    pub(crate) fn clear_expired_alert(&self) -> bool {
        let now_ms = Utc::now().timestamp_millis();
        let until = self.slow_consumer_alert_until.load(Ordering::Relaxed);
        if until == ALERT_CLEAR || now_ms <= until {
            return false;
        }
        // A concurrent re-arm wins over the sweep.
        self.slow_consumer_alert_until
            .compare_exchange(until, ALERT_CLEAR, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn snapshot(&self) -> InternalMetrics {
        let (container_received, container_processed, container_last) =
            self.container_metrics.load();
        let (counter_received, counter_processed, counter_last) = self.counter_events.load();
        let (value_received, value_processed, value_last) = self.value_metrics.load();

        InternalMetrics {
            total_envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            last_envelope_received_timestamp: self
                .last_envelope_received_timestamp
                .load(Ordering::Relaxed),
            total_metrics_received: self.metrics_received.load(Ordering::Relaxed),
            last_metric_received_timestamp: self
                .last_metric_received_timestamp
                .load(Ordering::Relaxed),
            total_container_metrics_received: container_received,
            total_container_metrics_processed: container_processed,
            last_container_metric_received_timestamp: container_last,
            total_counter_events_received: counter_received,
            total_counter_events_processed: counter_processed,
            last_counter_event_received_timestamp: counter_last,
            total_value_metrics_received: value_received,
            total_value_metrics_processed: value_processed,
            last_value_metric_received_timestamp: value_last,
            slow_consumer_alert: self.alert_raised(Utc::now().timestamp_millis()),
            last_slow_consumer_alert_timestamp: self
                .last_slow_consumer_alert_timestamp
                .load(Ordering::Relaxed),
        }
    }

    pub(crate) fn overwrite(&self, metrics: &InternalMetrics) {
        self.envelopes_received
            .store(metrics.total_envelopes_received, Ordering::Relaxed);
        self.last_envelope_received_timestamp
            .store(metrics.last_envelope_received_timestamp, Ordering::Relaxed);
        self.metrics_received
            .store(metrics.total_metrics_received, Ordering::Relaxed);
        self.last_metric_received_timestamp
            .store(metrics.last_metric_received_timestamp, Ordering::Relaxed);
        self.container_metrics.store(
            metrics.total_container_metrics_received,
            metrics.total_container_metrics_processed,
            metrics.last_container_metric_received_timestamp,
        );
        self.counter_events.store(
            metrics.total_counter_events_received,
            metrics.total_counter_events_processed,
            metrics.last_counter_event_received_timestamp,
        );
        self.value_metrics.store(
            metrics.total_value_metrics_received,
            metrics.total_value_metrics_processed,
            metrics.last_value_metric_received_timestamp,
        );
        self.arm_alert(metrics.slow_consumer_alert);
        self.last_slow_consumer_alert_timestamp
            .store(metrics.last_slow_consumer_alert_timestamp, Ordering::Relaxed);
    }
}
