pub mod envelope;
pub mod error;
pub mod filters;

pub use envelope::{
    ContainerMetricPayload, CounterEventPayload, Envelope, EnvelopeBuilder, EventType,
    ValueMetricPayload,
};
pub use error::{FirehoseError, Result};
pub use filters::{
    DeploymentAllowList, DeploymentFilter, DynDeploymentFilter, DynEventFilter, EventFilter,
    EventTypeAllowList,
};
