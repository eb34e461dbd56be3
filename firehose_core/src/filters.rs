use crate::{
    envelope::{Envelope, EventType},
    error::{FirehoseError, Result},
};
use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether envelopes from a deployment are retained.
pub trait DeploymentFilter: Send + Sync {
    fn enabled(&self, deployment: &str) -> bool;
}

/// Decides whether an individual envelope is retained.
pub trait EventFilter: Send + Sync {
    fn enabled(&self, envelope: &Envelope) -> bool;
}

pub type DynDeploymentFilter = Arc<dyn DeploymentFilter>;
pub type DynEventFilter = Arc<dyn EventFilter>;

/// Allows every deployment when empty, otherwise only the listed ones.
#[derive(Debug, Clone, Default)]
pub struct DeploymentAllowList {
    deployments: HashSet<String>,
}

impl DeploymentAllowList {
    pub fn new<I, S>(deployments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deployments: deployments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }
}

impl DeploymentFilter for DeploymentAllowList {
    fn enabled(&self, deployment: &str) -> bool {
        self.deployments.is_empty() || self.deployments.contains(deployment)
    }
}

/// Allows every metric kind when empty, otherwise only the listed ones.
#[derive(Debug, Clone, Default)]
pub struct EventTypeAllowList {
    event_types: HashSet<EventType>,
}

impl EventTypeAllowList {
    /// Only the three metric kinds can be selected.
    pub fn new<I, S>(event_types: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = HashSet::new();

        for name in event_types {
            let name = name.as_ref();
            let event_type = match name.to_lowercase().as_str() {
                "containermetric" => EventType::ContainerMetric,
                "counterevent" => EventType::CounterEvent,
                "valuemetric" => EventType::ValueMetric,
                _ => {
                    return Err(FirehoseError::UnsupportedEventType(format!(
                        "'{}' (expected ContainerMetric, CounterEvent or ValueMetric)",
                        name
                    )))
                }
            };
            selected.insert(event_type);
        }

        tracing::debug!("Event filter selects {} event types", selected.len());

        Ok(Self {
            event_types: selected,
        })
    }

    pub fn allow_all() -> Self {
        Self::default()
    }
}

impl EventFilter for EventTypeAllowList {
    fn enabled(&self, envelope: &Envelope) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&envelope.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_deployment_list_allows_everything() {
        let filter = DeploymentAllowList::allow_all();
        assert!(filter.enabled("cf"));
        assert!(filter.enabled(""));
    }

    #[test]
    fn test_deployment_list() {
        let filter = DeploymentAllowList::new(vec!["cf", "diego"]);
        assert!(filter.enabled("cf"));
        assert!(filter.enabled("diego"));
        assert!(!filter.enabled("redis"));
    }

    #[test]
    fn test_event_type_list() {
        let filter = EventTypeAllowList::new(["ContainerMetric", "valuemetric"]).unwrap();

        let container = Envelope::builder()
            .event_type(EventType::ContainerMetric)
            .build();
        let value = Envelope::builder().event_type(EventType::ValueMetric).build();
        let counter = Envelope::builder().event_type(EventType::CounterEvent).build();

        assert!(filter.enabled(&container));
        assert!(filter.enabled(&value));
        assert!(!filter.enabled(&counter));
    }

    #[test]
    fn test_empty_event_type_list_allows_everything() {
        let filter = EventTypeAllowList::new(Vec::<String>::new()).unwrap();
        let counter = Envelope::builder().event_type(EventType::CounterEvent).build();
        assert!(filter.enabled(&counter));
    }

    #[test]
    fn test_unsupported_event_type() {
        let result = EventTypeAllowList::new(["LogMessage"]);
        assert!(matches!(
            result,
            Err(FirehoseError::UnsupportedEventType(_))
        ));
    }
}
