//! In-memory cluster used by the unit tests.

use crate::auth::TokenStore;
use crate::error::AccessError;
use crate::model::{DEFAULT_NAMESPACE, PodId};
use crate::session::{Connect, PodApi};
use k8s_openapi::api::core::v1::Pod;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn pod_from_json(value: Value) -> Pod {
    serde_json::from_value(value)
        .expect("fixture pod deserializes")
}

/// A pod with one container per `(ready, restart_count)` entry.
pub fn pod(namespace: &str, name: &str, phase: &str, containers: &[(bool, i32)]) -> Pod {
    let specs = containers
        .iter()
        .enumerate()
        .map(|(index, _)| json!({ "name": format!("c{index}"), "image": "busybox" }))
        .collect::<Vec<_>>();
    let statuses = containers
        .iter()
        .enumerate()
        .map(|(index, (ready, restarts))| {
            json!({
                "name": format!("c{index}"),
                "image": "busybox",
                "imageID": "",
                "ready": ready,
                "restartCount": restarts,
            })
        })
        .collect::<Vec<_>>();

    let mut status = json!({ "phase": phase });
    if !statuses.is_empty() {
        status["containerStatuses"] = Value::Array(statuses);
    }

    pod_from_json(json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": "1",
            "creationTimestamp": "2024-01-01T00:00:00Z"
        },
        "spec": { "containers": specs },
        "status": status,
    }))
}

#[derive(Default)]
struct FakeState {
    pods: Vec<Pod>,
    calls: Vec<String>,
    failures: BTreeMap<String, AccessError>,
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCluster {
    pub fn with_pods(pods: Vec<Pod>) -> Self {
        let cluster = Self::default();
        cluster.lock().pods = pods;
        cluster
    }

    /// Every verb addressed at `id` fails with `error` from now on.
    pub fn fail_on(&self, id: &str, error: AccessError) {
        self.lock().failures.insert(id.to_string(), error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn pods(&self) -> Vec<Pod> {
        self.lock().pods.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake cluster lock")
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    fn check(&self, id: &PodId) -> Result<(), AccessError> {
        match self.lock().failures.get(&id.to_string()) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn position(state: &FakeState, id: &PodId) -> Option<usize> {
        state.pods.iter().position(|pod| {
            let namespace = pod.metadata.namespace.as_deref();
            namespace.unwrap_or(DEFAULT_NAMESPACE) == id.namespace
                && pod.metadata.name.as_deref() == Some(id.name.as_str())
        })
    }
}

fn not_found(id: &PodId) -> AccessError {
    AccessError::not_found(format!("pods \"{}\" not found", id.name))
}

pub struct FakeConnector {
    cluster: FakeCluster,
}

impl FakeConnector {
    pub const REJECTED: &'static str = "rejected-credential";

    pub fn new(cluster: FakeCluster) -> Self {
        Self { cluster }
    }
}

impl Connect for FakeConnector {
    type Api = FakeApi;

    async fn connect(&self, credential: &str) -> Result<FakeApi, AccessError> {
        self.cluster.record("connect".to_string());
        if credential == Self::REJECTED {
            return Err(AccessError::invalid_credential("credential rejected"));
        }
        Ok(FakeApi {
            cluster: self.cluster.clone(),
            credential: credential.to_string(),
        })
    }
}

pub struct FakeApi {
    cluster: FakeCluster,
    credential: String,
}

impl FakeApi {
    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl PodApi for FakeApi {
    async fn list_namespaced(&self, namespace: &str) -> Result<Vec<Pod>, AccessError> {
        self.cluster.record(format!("list:{namespace}"));
        Ok(self
            .cluster
            .pods()
            .into_iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Pod>, AccessError> {
        self.cluster.record("list:*".to_string());
        Ok(self.cluster.pods())
    }

    async fn get(&self, id: &PodId) -> Result<Pod, AccessError> {
        self.cluster.record(format!("get:{id}"));
        self.cluster.check(id)?;
        let state = self.cluster.lock();
        FakeCluster::position(&state, id)
            .map(|index| state.pods[index].clone())
            .ok_or_else(|| not_found(id))
    }

    async fn replace(&self, id: &PodId, pod: &Pod) -> Result<Pod, AccessError> {
        self.cluster.record(format!("replace:{id}"));
        self.cluster.check(id)?;
        let mut state = self.cluster.lock();
        let index = FakeCluster::position(&state, id)
            .ok_or_else(|| not_found(id))?;

        let current = state.pods[index]
            .metadata
            .resource_version
            .clone()
            .unwrap_or_default();
        if let Some(expected) = pod.metadata.resource_version.as_deref()
            && expected != current
        {
            return Err(AccessError::Conflict {
                message: format!("the object has been modified; resourceVersion {current}"),
            });
        }

        let mut stored = pod.clone();
        let next = current.parse::<u64>().unwrap_or(0) + 1;
        stored.metadata.resource_version = Some(next.to_string());
        state.pods[index] = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, id: &PodId) -> Result<(), AccessError> {
        self.cluster.record(format!("delete:{id}"));
        self.cluster.check(id)?;
        let mut state = self.cluster.lock();
        let index = FakeCluster::position(&state, id)
            .ok_or_else(|| not_found(id))?;
        state.pods.remove(index);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
    broken: AtomicBool,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
            broken: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().expect("token lock").clone()
    }

    /// Every later `load` fails as an unreadable store would.
    pub fn fail_loads(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> std::io::Result<Option<String>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stream did not contain valid UTF-8",
            ));
        }
        Ok(self.token())
    }

    async fn save(&self, token: &str) -> std::io::Result<()> {
        *self.token.lock().expect("token lock") = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> std::io::Result<()> {
        *self.token.lock().expect("token lock") = None;
        Ok(())
    }
}
