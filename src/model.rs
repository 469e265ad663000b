use crate::error::AccessError;
use k8s_openapi::api::core::v1::ContainerPort;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const POD_RESOURCE: &str = "pods";
pub const ALL_NAMESPACES: &str = "all";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const CREATE_SENTINEL_ID: &str = "new";

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Running,
    Pending,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub const ALL: [Self; 5] = [
        Self::Running,
        Self::Pending,
        Self::Succeeded,
        Self::Failed,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Pending => "Pending",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_token(token: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(token.trim()))
            .unwrap_or_default()
    }
}

impl Display for PodPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NamespaceScope {
    All,
    Named(String),
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

/// Composite `namespace/name` key used by every CRUD operation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PodId {
    pub namespace: String,
    pub name: String,
}

impl PodId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Splits on the first `/`; the name may itself contain further slashes.
    pub fn parse(id: &str) -> Result<Self, AccessError> {
        let Some((namespace, name)) = id.split_once('/') else {
            return Err(AccessError::invalid_input(format!(
                "invalid pod id '{id}': expected namespace/name"
            )));
        };
        if namespace.is_empty() || name.is_empty() {
            return Err(AccessError::invalid_input(format!(
                "invalid pod id '{id}': namespace and name must not be empty"
            )));
        }
        Ok(Self::new(namespace, name))
    }
}

impl Display for PodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub image: Option<String>,
    pub ports: Vec<ContainerPort>,
}

/// UI-facing projection of a cluster Pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub status: PodPhase,
    pub ready: bool,
    pub restarts: i64,
    /// Raw ISO-8601 creation timestamp, empty when the cluster did not report one.
    pub age: String,
    pub node: String,
    pub containers: Vec<ContainerSummary>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub creation_timestamp: Option<String>,
    pub uid: Option<String>,
    pub resource_version: Option<String>,
    pub spec: Value,
    pub status_details: Value,
}

impl PodRecord {
    pub fn pod_id(&self) -> PodId {
        PodId::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodFilter {
    pub namespace: Option<String>,
    pub q: Option<String>,
    pub status: Option<String>,
}

impl PodFilter {
    pub fn scope(&self) -> NamespaceScope {
        match self.namespace.as_deref().map(str::trim) {
            Some(namespace) if !namespace.is_empty() && namespace != ALL_NAMESPACES => {
                NamespaceScope::Named(namespace.to_string())
            }
            _ => NamespaceScope::All,
        }
    }

    /// Sets a filter key by name. Returns false for keys the pod filter does not know.
    pub fn set_key(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "namespace" => &mut self.namespace,
            "q" => &mut self.q,
            "status" => &mut self.status,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }

    pub fn matches(&self, record: &PodRecord) -> bool {
        self.matches_query(record) && self.matches_status(record)
    }

    fn matches_query(&self, record: &PodRecord) -> bool {
        let Some(query) = self.q.as_deref().filter(|value| !value.is_empty()) else {
            return true;
        };
        let query = query.to_lowercase();
        [
            record.name.as_str(),
            record.namespace.as_str(),
            record.status.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
    }

    fn matches_status(&self, record: &PodRecord) -> bool {
        let Some(status) = self.status.as_deref().filter(|value| !value.is_empty()) else {
            return true;
        };
        record.status.as_str().to_lowercase() == status.to_lowercase()
    }
}

/// Fields a caller supplies to replace a pod. Anything a record carries beyond
/// these is ignored, so an edited record can be sent back as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodPatch {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
    pub spec: Value,
    pub resource_version: Option<String>,
}

impl From<&PodRecord> for PodPatch {
    fn from(record: &PodRecord) -> Self {
        Self {
            name: Some(record.name.clone()),
            namespace: Some(record.namespace.clone()),
            labels: Some(record.labels.clone()),
            annotations: Some(record.annotations.clone()),
            spec: record.spec.clone(),
            resource_version: record.resource_version.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Identity {
    pub const PLACEHOLDER_ID: &'static str = "kubernetes-user";

    pub fn named(user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            id: user.clone(),
            full_name: user,
            avatar: None,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            id: Self::PLACEHOLDER_ID.to_string(),
            full_name: "Kubernetes User".to_string(),
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub id: String,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AccessError>,
}
