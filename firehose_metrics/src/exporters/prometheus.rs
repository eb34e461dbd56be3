use crate::{
    bridge::InternalMetricsCollector,
    records::{ContainerMetric, CounterEvent, ValueMetric},
    store::MetricStore,
};
use firehose_core::{FirehoseError, Result};
use ::prometheus::proto::{MetricFamily, MetricType};
use ::prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::hash_map::{Entry, HashMap};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Content type of the rendered scrape body.
pub const TEXT_CONTENT_TYPE: &str = ::prometheus::TEXT_FORMAT;

const SOURCE_LABELS: [&str; 5] = [
    "origin",
    "bosh_deployment",
    "bosh_job",
    "bosh_index",
    "bosh_ip",
];

fn encoding_error(e: ::prometheus::Error) -> FirehoseError {
    FirehoseError::EncodingError(e.to_string())
}

/// Encodes families in the text exposition format.
///
/// `TextEncoder` cannot write untyped families, so those are written here
/// and everything else goes through the encoder. Family order is kept.
pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    for family in families {
        if family.get_field_type() == MetricType::UNTYPED {
            write_untyped(family, &mut buffer)?;
        } else {
            encoder
                .encode(std::slice::from_ref(family), &mut buffer)
                .map_err(encoding_error)?;
        }
    }

    String::from_utf8(buffer).map_err(|e| FirehoseError::EncodingError(e.to_string()))
}

fn write_untyped(family: &MetricFamily, out: &mut impl Write) -> std::io::Result<()> {
    let name = family.get_name();
    writeln!(out, "# HELP {} {}", name, escape(family.get_help(), false))?;
    writeln!(out, "# TYPE {} untyped", name)?;

    for metric in family.get_metric() {
        out.write_all(name.as_bytes())?;
        let labels = metric.get_label();
        if !labels.is_empty() {
            let pairs: Vec<String> = labels
                .iter()
                .map(|pair| format!("{}=\"{}\"", pair.get_name(), escape(pair.get_value(), true)))
                .collect();
            write!(out, "{{{}}}", pairs.join(","))?;
        }
        writeln!(out, " {}", format_value(metric.get_untyped().get_value()))?;
    }

    Ok(())
}

// Help text escapes backslash and newline; label values also escape quotes.
fn escape(text: &str, quotes: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' if quotes => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Distinct raw names can normalize to the same metric name. A series (metric
/// name plus label values) belongs to the first raw name that claims it.
#[derive(Default)]
struct SeriesClaims {
    owners: HashMap<(String, Vec<String>), String>,
}

impl SeriesClaims {
    fn claim(&mut self, metric: &str, labels: &[&str], raw_name: &str) -> bool {
        let series = (
            metric.to_string(),
            labels.iter().map(|label| label.to_string()).collect(),
        );
        match self.owners.entry(series) {
            Entry::Vacant(entry) => {
                entry.insert(raw_name.to_string());
                true
            }
            Entry::Occupied(entry) => {
                if entry.get() != raw_name {
                    warn!(
                        "Skipping '{}': series {} already rendered for '{}'",
                        raw_name,
                        metric,
                        entry.get()
                    );
                }
                false
            }
        }
    }
}

/// Turns a firehose metric name into a prometheus-safe snake case name.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len() + 8);
    let mut after_lower = false;

    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if after_lower {
                normalized.push('_');
            }
            normalized.push(c.to_ascii_lowercase());
            after_lower = false;
        } else if c.is_ascii_alphanumeric() {
            normalized.push(c);
            after_lower = true;
        } else {
            normalized.push('_');
            after_lower = false;
        }
    }

    normalized
}

/// Renders a full scrape: the internal counters plus every retained record.
pub struct PrometheusExporter {
    namespace: String,
    store: Arc<MetricStore>,
    registry: Registry,
    flush_after_scrape: bool,
}

impl PrometheusExporter {
    pub fn new(namespace: impl Into<String>, store: Arc<MetricStore>) -> Result<Self> {
        let namespace = namespace.into();
        let registry = Registry::new();
        let collector = InternalMetricsCollector::new(&namespace, store.clone())?;
        registry
            .register(Box::new(collector))
            .map_err(encoding_error)?;

        Ok(Self {
            namespace,
            store,
            registry,
            flush_after_scrape: false,
        })
    }

    /// Empty the record caches after every scrape.
    pub fn flush_after_scrape(mut self, flush: bool) -> Self {
        self.flush_after_scrape = flush;
        self
    }

    pub async fn render(&self) -> Result<String> {
        let mut families = self.registry.gather();
        families.extend(self.record_families().await?);
        encode_text(&families)
    }

    async fn record_families(&self) -> Result<Vec<MetricFamily>> {
        let scrape = Registry::new();

        let (containers, counters, values) = if self.flush_after_scrape {
            (
                self.store.drain_container_metrics().await,
                self.store.drain_counter_events().await,
                self.store.drain_value_metrics().await,
            )
        } else {
            (
                self.store.get_container_metrics().await,
                self.store.get_counter_events().await,
                self.store.get_value_metrics().await,
            )
        };
        debug!(
            "Rendering {} container metrics, {} counter events, {} value metrics",
            containers.len(),
            counters.len(),
            values.len()
        );

        self.register_container_metrics(&scrape, &containers)?;
        self.register_counter_events(&scrape, &counters)?;
        self.register_value_metrics(&scrape, &values)?;

        Ok(scrape.gather())
    }

    fn gauge_vec(&self, scrape: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
        let gauge = GaugeVec::new(Opts::new(name, help).namespace(self.namespace.as_str()), labels)
            .map_err(encoding_error)?;
        scrape
            .register(Box::new(gauge.clone()))
            .map_err(encoding_error)?;
        Ok(gauge)
    }

    fn register_container_metrics(&self, scrape: &Registry, records: &[ContainerMetric]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let labels: Vec<&str> = SOURCE_LABELS
            .iter()
            .copied()
            .chain(["application_id", "instance_index"])
            .collect();

        type Field = fn(&ContainerMetric) -> f64;
        let fields: [(&str, &str, Field); 5] = [
            (
                "container_metric_cpu_percentage",
                "Cloud Foundry Firehose container metric: CPU used, on a scale of 0 to 100.",
                |r: &ContainerMetric| r.cpu_percentage,
            ),
            (
                "container_metric_memory_bytes",
                "Cloud Foundry Firehose container metric: bytes of memory used.",
                |r: &ContainerMetric| r.memory_bytes as f64,
            ),
            (
                "container_metric_disk_bytes",
                "Cloud Foundry Firehose container metric: bytes of disk used.",
                |r: &ContainerMetric| r.disk_bytes as f64,
            ),
            (
                "container_metric_memory_bytes_quota",
                "Cloud Foundry Firehose container metric: maximum bytes of memory allocated to container.",
                |r: &ContainerMetric| r.memory_bytes_quota as f64,
            ),
            (
                "container_metric_disk_bytes_quota",
                "Cloud Foundry Firehose container metric: maximum bytes of disk allocated to container.",
                |r: &ContainerMetric| r.disk_bytes_quota as f64,
            ),
        ];

        for (name, help, read) in fields {
            let gauge = self.gauge_vec(scrape, name, help, &labels)?;
            for record in records {
                let instance_index = record.instance_index.to_string();
                gauge
                    .with_label_values(&[
                        record.origin.as_str(),
                        record.deployment.as_str(),
                        record.job.as_str(),
                        record.index.as_str(),
                        record.ip.as_str(),
                        record.application_id.as_str(),
                        instance_index.as_str(),
                    ])
                    .set(read(record));
            }
        }

        Ok(())
    }

    fn register_counter_events(&self, scrape: &Registry, records: &[CounterEvent]) -> Result<()> {
        let mut families: HashMap<String, (CounterVec, GaugeVec)> = HashMap::new();
        let mut claims = SeriesClaims::default();

        let mut records: Vec<&CounterEvent> = records.iter().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        for record in records {
            let name = normalize_name(&record.name);
            let source = [
                record.origin.as_str(),
                record.deployment.as_str(),
                record.job.as_str(),
                record.index.as_str(),
                record.ip.as_str(),
            ];
            if !claims.claim(&name, &source, &record.name) {
                continue;
            }

            let (total, delta) = match families.entry(name) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let name = entry.key();
                    let total = CounterVec::new(
                        Opts::new(
                            format!("counter_event_{}_total", name),
                            format!("Cloud Foundry Firehose '{}' total counter event.", record.name),
                        )
                        .namespace(self.namespace.as_str()),
                        &SOURCE_LABELS,
                    )
                    .map_err(encoding_error)?;
                    scrape
                        .register(Box::new(total.clone()))
                        .map_err(encoding_error)?;

                    let delta = self.gauge_vec(
                        scrape,
                        &format!("counter_event_{}_delta", name),
                        &format!("Cloud Foundry Firehose '{}' delta counter event.", record.name),
                        &SOURCE_LABELS,
                    )?;
                    entry.insert((total, delta))
                }
            };

            // Fresh registry per scrape, so each series is incremented once.
            total.with_label_values(&source).inc_by(record.total as f64);
            delta.with_label_values(&source).set(record.delta as f64);
        }

        Ok(())
    }

    fn register_value_metrics(&self, scrape: &Registry, records: &[ValueMetric]) -> Result<()> {
        let labels: Vec<&str> = SOURCE_LABELS.iter().copied().chain(["unit"]).collect();
        let mut gauges: HashMap<String, GaugeVec> = HashMap::new();
        let mut claims = SeriesClaims::default();

        let mut records: Vec<&ValueMetric> = records.iter().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        for record in records {
            let name = normalize_name(&record.name);
            let series = [
                record.origin.as_str(),
                record.deployment.as_str(),
                record.job.as_str(),
                record.index.as_str(),
                record.ip.as_str(),
                record.unit.as_str(),
            ];
            if !claims.claim(&name, &series, &record.name) {
                continue;
            }

            let gauge = match gauges.entry(name) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let gauge = self.gauge_vec(
                        scrape,
                        &format!("value_metric_{}", entry.key()),
                        &format!("Cloud Foundry Firehose '{}' value metric.", record.name),
                        &labels,
                    )?;
                    entry.insert(gauge)
                }
            };
            gauge.with_label_values(&series).set(record.value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use firehose_core::{
        ContainerMetricPayload, CounterEventPayload, Envelope, ValueMetricPayload,
    };
    use std::time::Duration;

    fn source() -> firehose_core::EnvelopeBuilder {
        Envelope::builder()
            .origin("rep")
            .deployment("cf")
            .job("diego_cell")
            .index("0")
            .ip("10.0.0.1")
    }

    async fn populated_store() -> Arc<MetricStore> {
        let store = Arc::new(MetricStore::allow_all(StoreConfig {
            expiration: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }));

        store
            .add_metric(
                &source()
                    .container_metric(ContainerMetricPayload {
                        application_id: "A1".to_string(),
                        instance_index: 1,
                        cpu_percentage: 0.5,
                        memory_bytes: 1000,
                        ..Default::default()
                    })
                    .build(),
            )
            .await;
        store
            .add_metric(
                &source()
                    .counter_event(CounterEventPayload {
                        name: "dropsondeListener.receivedMessageCount".to_string(),
                        delta: 5,
                        total: 1000,
                    })
                    .build(),
            )
            .await;
        store
            .add_metric(
                &source()
                    .value_metric(ValueMetricPayload {
                        name: "memoryStats.numBytesAllocated".to_string(),
                        value: 2048.0,
                        unit: "bytes".to_string(),
                    })
                    .build(),
            )
            .await;

        store
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("requestCount"), "request_count");
        assert_eq!(
            normalize_name("memoryStats.numBytesAllocated"),
            "memory_stats_num_bytes_allocated"
        );
        assert_eq!(normalize_name("CPU"), "cpu");
        assert_eq!(normalize_name("http-latency"), "http_latency");
        assert_eq!(normalize_name(""), "");
    }

    #[tokio::test]
    async fn test_render_includes_internal_and_records() {
        let store = populated_store().await;
        let exporter = PrometheusExporter::new("firehose", store).unwrap();

        let text = exporter.render().await.unwrap();

        assert!(text.contains("firehose_total_envelopes_received 3"));
        assert!(text.contains("# TYPE firehose_slow_consumer_alert untyped"));
        assert!(text.contains("firehose_container_metric_cpu_percentage{"));
        assert!(text.contains("application_id=\"A1\""));
        assert!(text.contains("instance_index=\"1\""));
        assert!(text.contains(
            "# TYPE firehose_counter_event_dropsonde_listener_received_message_count_total counter"
        ));
        assert!(text.contains("firehose_value_metric_memory_stats_num_bytes_allocated{"));
        assert!(text.contains("unit=\"bytes\""));
    }

    #[tokio::test]
    async fn test_flush_after_scrape() {
        let store = populated_store().await;
        let exporter = PrometheusExporter::new("firehose", store.clone())
            .unwrap()
            .flush_after_scrape(true);

        let first = exporter.render().await.unwrap();
        assert!(first.contains("firehose_value_metric_"));

        assert!(store.get_container_metrics().await.is_empty());
        assert!(store.get_counter_events().await.is_empty());
        assert!(store.get_value_metrics().await.is_empty());
        assert_eq!(store.get_internal_metrics().total_envelopes_received, 3);

        let second = exporter.render().await.unwrap();
        assert!(!second.contains("firehose_value_metric_"));
        assert!(second.contains("firehose_total_envelopes_received 3"));
    }

    #[tokio::test]
    async fn test_records_kept_without_flush() {
        let store = populated_store().await;
        let exporter = PrometheusExporter::new("firehose", store.clone()).unwrap();

        exporter.render().await.unwrap();

        assert_eq!(store.get_value_metrics().await.len(), 1);
    }

    fn series_lines<'a>(text: &'a str, metric: &str) -> Vec<&'a str> {
        let prefix = format!("{}{{", metric);
        text.lines().filter(|line| line.starts_with(&prefix)).collect()
    }

    #[tokio::test]
    async fn test_alert_sample_rendered_untyped() {
        let store = populated_store().await;
        store.alert_slow_consumer_error();
        let exporter = PrometheusExporter::new("firehose", store).unwrap();

        let text = exporter.render().await.unwrap();

        assert!(text.contains("# TYPE firehose_slow_consumer_alert untyped\n"));
        assert!(text.contains("\nfirehose_slow_consumer_alert 1\n"));
        assert!(text.contains("# TYPE firehose_last_slow_consumer_alert_timestamp gauge"));
    }

    #[test]
    fn test_encode_untyped_with_labels() {
        let mut pair = ::prometheus::proto::LabelPair::default();
        pair.set_name("path".to_string());
        pair.set_value("a\"b\\c".to_string());

        let mut untyped = ::prometheus::proto::Untyped::default();
        untyped.set_value(f64::INFINITY);
        let mut metric = ::prometheus::proto::Metric::default();
        metric.mut_label().push(pair);
        metric.set_untyped(untyped);

        let mut family = MetricFamily::default();
        family.set_name("requests".to_string());
        family.set_help("line one\nline two".to_string());
        family.set_field_type(MetricType::UNTYPED);
        family.mut_metric().push(metric);

        let text = encode_text(&[family]).unwrap();

        assert_eq!(
            text,
            "# HELP requests line one\\nline two\n\
             # TYPE requests untyped\n\
             requests{path=\"a\\\"b\\\\c\"} +Inf\n"
        );
    }

    #[tokio::test]
    async fn test_colliding_counter_names_are_not_summed() {
        let store = Arc::new(MetricStore::allow_all(StoreConfig {
            expiration: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }));
        for (name, total) in [("a.b", 10), ("a_b", 5)] {
            store
                .add_metric(
                    &source()
                        .counter_event(CounterEventPayload {
                            name: name.to_string(),
                            delta: 1,
                            total,
                        })
                        .build(),
                )
                .await;
        }
        assert_eq!(store.get_counter_events().await.len(), 2);

        let text = PrometheusExporter::new("firehose", store)
            .unwrap()
            .render()
            .await
            .unwrap();

        let totals = series_lines(&text, "firehose_counter_event_a_b_total");
        assert_eq!(totals.len(), 1);
        assert!(totals[0].ends_with(" 10"), "{}", totals[0]);
        assert_eq!(series_lines(&text, "firehose_counter_event_a_b_delta").len(), 1);
    }

    #[tokio::test]
    async fn test_colliding_value_names_keep_first() {
        let store = Arc::new(MetricStore::allow_all(StoreConfig {
            expiration: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }));
        let records = [
            ("cpu_load", 2.0, "ratio"),
            ("cpuLoad", 3.0, "ratio"),
            ("cpu.load", 7.0, "percent"),
        ];
        for (name, value, unit) in records {
            store
                .add_metric(
                    &source()
                        .value_metric(ValueMetricPayload {
                            name: name.to_string(),
                            value,
                            unit: unit.to_string(),
                        })
                        .build(),
                )
                .await;
        }

        let text = PrometheusExporter::new("firehose", store)
            .unwrap()
            .render()
            .await
            .unwrap();

        let lines = series_lines(&text, "firehose_value_metric_cpu_load");
        assert_eq!(lines.len(), 2);
        assert!(lines
            .iter()
            .any(|line| line.contains("unit=\"percent\"") && line.ends_with(" 7")));
        // "cpuLoad" sorts before "cpu_load"
        assert!(lines
            .iter()
            .any(|line| line.contains("unit=\"ratio\"") && line.ends_with(" 3")));
    }
}
