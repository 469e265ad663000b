use crate::model::{ContainerSummary, DEFAULT_NAMESPACE, PodId, PodPhase, PodRecord};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use serde::Serialize;
use serde_json::Value;

/// Projects a cluster pod into the record shape the UI consumes.
///
/// Total over partial input: an unscheduled pod, a pod whose containers have
/// not reported yet, or one missing timestamps all produce a record with the
/// documented defaults.
pub fn to_record(pod: &Pod) -> PodRecord {
    let metadata = &pod.metadata;
    let name = metadata.name.clone().unwrap_or_default();
    let namespace = metadata
        .namespace
        .clone()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let status = pod
        .status
        .as_ref()
        .and_then(|value| value.phase.as_deref())
        .map(PodPhase::from_token)
        .unwrap_or_default();
    let (ready, restarts) = pod
        .status
        .as_ref()
        .map(container_health)
        .unwrap_or((false, 0));
    let creation_timestamp = metadata
        .creation_timestamp
        .as_ref()
        .map(|time| time.0.to_string());
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_default();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| ContainerSummary {
                    name: container.name.clone(),
                    image: container.image.clone(),
                    ports: container.ports.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    PodRecord {
        id: PodId::new(namespace.clone(), name.clone()).to_string(),
        name,
        namespace,
        status,
        ready,
        restarts,
        age: creation_timestamp.clone().unwrap_or_default(),
        node,
        containers,
        labels: metadata.labels.clone().unwrap_or_default(),
        annotations: metadata.annotations.clone().unwrap_or_default(),
        creation_timestamp,
        uid: metadata.uid.clone(),
        resource_version: metadata.resource_version.clone(),
        spec: raw_value(pod.spec.as_ref()),
        status_details: raw_value(pod.status.as_ref()),
    }
}

fn container_health(status: &PodStatus) -> (bool, i64) {
    let statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let ready = !statuses.is_empty() && statuses.iter().all(|container| container.ready);
    let restarts = statuses
        .iter()
        .map(|container| i64::from(container.restart_count))
        .sum();
    (ready, restarts)
}

fn raw_value<T>(value: Option<&T>) -> Value
where
    T: Serialize,
{
    value
        .and_then(|inner| serde_json::to_value(inner).ok())
        .unwrap_or(Value::Null)
}
