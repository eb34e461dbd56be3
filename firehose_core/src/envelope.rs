use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind tag carried by every envelope on the firehose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EventType {
    ContainerMetric,
    CounterEvent,
    ValueMetric,
    HttpStartStop,
    LogMessage,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ContainerMetric => "ContainerMetric",
            EventType::CounterEvent => "CounterEvent",
            EventType::ValueMetric => "ValueMetric",
            EventType::HttpStartStop => "HttpStartStop",
            EventType::LogMessage => "LogMessage",
            EventType::Error => "Error",
            EventType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerMetricPayload {
    pub application_id: String,
    pub instance_index: i32,
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    pub memory_bytes_quota: u64,
    pub disk_bytes_quota: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CounterEventPayload {
    pub name: String,
    pub delta: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValueMetricPayload {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// One inbound firehose event.
///
/// Every field is optional on the wire. Missing fields, including a missing
/// payload for the declared kind, read back as zero values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Envelope {
    pub origin: String,
    pub event_type: EventType,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
    pub tags: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_metric: Option<ContainerMetricPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_event: Option<CounterEventPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_metric: Option<ValueMetricPayload>,
}

impl Envelope {
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    pub fn container_metric(&self) -> ContainerMetricPayload {
        self.container_metric.clone().unwrap_or_default()
    }

    pub fn counter_event(&self) -> CounterEventPayload {
        self.counter_event.clone().unwrap_or_default()
    }

    pub fn value_metric(&self) -> ValueMetricPayload {
        self.value_metric.clone().unwrap_or_default()
    }

    pub fn description(&self) -> String {
        format!(
            "{} from {}/{}/{} ({})",
            self.event_type, self.deployment, self.job, self.index, self.origin
        )
    }
}

#[derive(Default)]
pub struct EnvelopeBuilder {
    envelope: Envelope,
}

impl EnvelopeBuilder {
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.envelope.origin = origin.into();
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.envelope.event_type = event_type;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.envelope.timestamp = timestamp;
        self
    }

    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.envelope.deployment = deployment.into();
        self
    }

    pub fn job(mut self, job: impl Into<String>) -> Self {
        self.envelope.job = job.into();
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.envelope.index = index.into();
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.envelope.ip = ip.into();
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envelope.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the container payload and tags the envelope as a container metric.
    pub fn container_metric(mut self, payload: ContainerMetricPayload) -> Self {
        self.envelope.event_type = EventType::ContainerMetric;
        self.envelope.container_metric = Some(payload);
        self
    }

    pub fn counter_event(mut self, payload: CounterEventPayload) -> Self {
        self.envelope.event_type = EventType::CounterEvent;
        self.envelope.counter_event = Some(payload);
        self
    }

    pub fn value_metric(mut self, payload: ValueMetricPayload) -> Self {
        self.envelope.event_type = EventType::ValueMetric;
        self.envelope.value_metric = Some(payload);
        self
    }

    pub fn build(self) -> Envelope {
        self.envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_event_type_from_payload() {
        let envelope = Envelope::builder()
            .origin("o")
            .deployment("d")
            .counter_event(CounterEventPayload {
                name: "requests".to_string(),
                delta: 1,
                total: 10,
            })
            .build();

        assert_eq!(envelope.event_type, EventType::CounterEvent);
        assert_eq!(envelope.counter_event().total, 10);
        assert_eq!(envelope.description(), "CounterEvent from d// (o)");
    }

    #[test]
    fn test_missing_payload_reads_as_zero_value() {
        let envelope = Envelope::builder()
            .event_type(EventType::ContainerMetric)
            .build();

        assert_eq!(envelope.container_metric(), ContainerMetricPayload::default());
        assert_eq!(envelope.value_metric().value, 0.0);
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{"origin":"rep","event_type":"ValueMetric","value_metric":{"name":"latency"}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();

        assert_eq!(envelope.event_type, EventType::ValueMetric);
        assert_eq!(envelope.value_metric().name, "latency");
        assert_eq!(envelope.value_metric().unit, "");
        assert!(envelope.tags.is_empty());
        assert_eq!(envelope.timestamp, 0);
    }

    #[test]
    fn test_unrecognized_event_type() {
        let json = r#"{"event_type":"SomethingNew"}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();

        assert_eq!(envelope.event_type, EventType::Unknown);
        assert_eq!(envelope.event_type.to_string(), "Unknown");
    }
}
