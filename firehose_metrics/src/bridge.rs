//! Exposes the store's internal counters to a prometheus registry.

use crate::{internal::InternalMetrics, store::MetricStore};
use firehose_core::{FirehoseError, Result};
use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::Opts;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    Counter,
    Gauge,
    Untyped,
}

struct InternalSample {
    desc: Desc,
    kind: SampleKind,
    read: fn(&InternalMetrics) -> f64,
}

impl InternalSample {
    fn family(&self, value: f64) -> MetricFamily {
        let mut metric = proto::Metric::default();
        let field_type = match self.kind {
            SampleKind::Counter => {
                let mut counter = proto::Counter::default();
                counter.set_value(value);
                metric.set_counter(counter);
                MetricType::COUNTER
            }
            SampleKind::Gauge => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(value);
                metric.set_gauge(gauge);
                MetricType::GAUGE
            }
            SampleKind::Untyped => {
                let mut untyped = proto::Untyped::default();
                untyped.set_value(value);
                metric.set_untyped(untyped);
                MetricType::UNTYPED
            }
        };

        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(field_type);
        family.mut_metric().push(metric);
        family
    }
}

fn alert_value(raised: bool) -> f64 {
    if raised {
        1.0
    } else {
        0.0
    }
}

type SampleSpec = (&'static str, &'static str, SampleKind, fn(&InternalMetrics) -> f64);

const SAMPLES: [SampleSpec; 15] = [
    (
        "total_envelopes_received",
        "Total number of envelopes received from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_envelopes_received as f64,
    ),
    (
        "last_envelope_received_timestamp",
        "Number of seconds since 1970 since last envelope received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_envelope_received_timestamp as f64,
    ),
    (
        "total_metrics_received",
        "Total number of metrics received from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_metrics_received as f64,
    ),
    (
        "last_metric_received_timestamp",
        "Number of seconds since 1970 since last metric received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_metric_received_timestamp as f64,
    ),
    (
        "total_container_metrics_received",
        "Total number of container metrics received from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_container_metrics_received as f64,
    ),
    (
        "total_container_metrics_processed",
        "Total number of container metrics processed from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_container_metrics_processed as f64,
    ),
    (
        "last_container_metric_received_timestamp",
        "Number of seconds since 1970 since last container metric received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_container_metric_received_timestamp as f64,
    ),
    (
        "total_counter_events_received",
        "Total number of counter events received from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_counter_events_received as f64,
    ),
    (
        "total_counter_events_processed",
        "Total number of counter events processed from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_counter_events_processed as f64,
    ),
    (
        "last_counter_event_received_timestamp",
        "Number of seconds since 1970 since last counter event received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_counter_event_received_timestamp as f64,
    ),
    (
        "total_value_metrics_received",
        "Total number of value metrics received from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_value_metrics_received as f64,
    ),
    (
        "total_value_metrics_processed",
        "Total number of value metrics processed from Cloud Foundry Firehose.",
        SampleKind::Counter,
        |m: &InternalMetrics| m.total_value_metrics_processed as f64,
    ),
    (
        "last_value_metric_received_timestamp",
        "Number of seconds since 1970 since last value metric received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_value_metric_received_timestamp as f64,
    ),
    (
        "slow_consumer_alert",
        "Nozzle could not keep up with Cloud Foundry Firehose.",
        SampleKind::Untyped,
        |m: &InternalMetrics| alert_value(m.slow_consumer_alert),
    ),
    (
        "last_slow_consumer_alert_timestamp",
        "Number of seconds since 1970 since last slow consumer alert received from Cloud Foundry Firehose.",
        SampleKind::Gauge,
        |m: &InternalMetrics| m.last_slow_consumer_alert_timestamp as f64,
    ),
];

/// Collector reporting the nozzle's own ingestion counters.
///
/// Each scrape reads one snapshot from the store; the store is never mutated.
pub struct InternalMetricsCollector {
    store: Arc<MetricStore>,
    samples: Vec<InternalSample>,
}

impl InternalMetricsCollector {
    pub fn new(namespace: &str, store: Arc<MetricStore>) -> Result<Self> {
        let samples = SAMPLES
            .iter()
            .map(|(name, help, kind, read)| -> Result<InternalSample> {
                let desc = Opts::new(*name, *help)
                    .namespace(namespace)
                    .describe()
                    .map_err(|e| {
                        FirehoseError::InvalidConfig(format!("metric '{}': {}", name, e))
                    })?;
                Ok(InternalSample {
                    desc,
                    kind: *kind,
                    read: *read,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { store, samples })
    }
}

impl Collector for InternalMetricsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.samples.iter().map(|sample| &sample.desc).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.store.get_internal_metrics();
        self.samples
            .iter()
            .map(|sample| sample.family((sample.read)(&snapshot)))
            .collect()
    }
}
