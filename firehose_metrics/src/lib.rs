pub mod bridge;
pub mod cache;
pub mod exporters;
pub mod internal;
pub mod records;
pub mod store;

pub use bridge::InternalMetricsCollector;
pub use cache::{Retention, TtlCache};
pub use internal::InternalMetrics;
pub use records::{
    ContainerMetric, ContainerMetrics, CounterEvent, CounterEvents, ValueMetric, ValueMetrics,
};
pub use store::{metric_key, MetricStore, StoreConfig};
