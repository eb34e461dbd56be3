use firehose_core::Envelope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainerMetric {
    pub origin: String,
    pub timestamp: i64,
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
    pub tags: HashMap<String, String>,
    pub application_id: String,
    pub instance_index: i32,
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    pub memory_bytes_quota: u64,
    pub disk_bytes_quota: u64,
}

impl ContainerMetric {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let payload = envelope.container_metric();
        Self {
            origin: envelope.origin.clone(),
            timestamp: envelope.timestamp,
            deployment: envelope.deployment.clone(),
            job: envelope.job.clone(),
            index: envelope.index.clone(),
            ip: envelope.ip.clone(),
            tags: envelope.tags.clone(),
            application_id: payload.application_id,
            instance_index: payload.instance_index,
            cpu_percentage: payload.cpu_percentage,
            memory_bytes: payload.memory_bytes,
            disk_bytes: payload.disk_bytes,
            memory_bytes_quota: payload.memory_bytes_quota,
            disk_bytes_quota: payload.disk_bytes_quota,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterEvent {
    pub origin: String,
    pub timestamp: i64,
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
    pub tags: HashMap<String, String>,
    pub name: String,
    pub delta: u64,
    pub total: u64,
}

impl CounterEvent {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let payload = envelope.counter_event();
        Self {
            origin: envelope.origin.clone(),
            timestamp: envelope.timestamp,
            deployment: envelope.deployment.clone(),
            job: envelope.job.clone(),
            index: envelope.index.clone(),
            ip: envelope.ip.clone(),
            tags: envelope.tags.clone(),
            name: payload.name,
            delta: payload.delta,
            total: payload.total,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValueMetric {
    pub origin: String,
    pub timestamp: i64,
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
    pub tags: HashMap<String, String>,
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl ValueMetric {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let payload = envelope.value_metric();
        Self {
            origin: envelope.origin.clone(),
            timestamp: envelope.timestamp,
            deployment: envelope.deployment.clone(),
            job: envelope.job.clone(),
            index: envelope.index.clone(),
            ip: envelope.ip.clone(),
            tags: envelope.tags.clone(),
            name: payload.name,
            value: payload.value,
            unit: payload.unit,
        }
    }
}

pub type ContainerMetrics = Vec<ContainerMetric>;
pub type CounterEvents = Vec<CounterEvent>;
pub type ValueMetrics = Vec<ValueMetric>;
