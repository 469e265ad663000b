use crate::error::AccessError;
use crate::model::PodId;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// The cluster verbs the access layer consumes, keyed by `(namespace, name)`.
pub trait PodApi: Send + Sync + 'static {
    fn list_namespaced(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<Pod>, AccessError>> + Send;

    fn list_all(&self) -> impl Future<Output = Result<Vec<Pod>, AccessError>> + Send;

    fn get(&self, id: &PodId) -> impl Future<Output = Result<Pod, AccessError>> + Send;

    fn replace(
        &self,
        id: &PodId,
        pod: &Pod,
    ) -> impl Future<Output = Result<Pod, AccessError>> + Send;

    fn delete(&self, id: &PodId) -> impl Future<Output = Result<(), AccessError>> + Send;
}

/// Turns a credential blob into an authenticated [`PodApi`].
pub trait Connect: Send + Sync + 'static {
    type Api: PodApi;

    fn connect(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Self::Api, AccessError>> + Send;
}

/// Holder of the live cluster client.
///
/// Replacement is all-or-nothing: a new client is built completely before it
/// is swapped in, and concurrent `initialize` calls are serialized so the last
/// caller to finish wins. Readers take a cheap `Arc` snapshot and never observe
/// a half-built client.
pub struct ClusterSession<C: Connect> {
    connector: C,
    client: RwLock<Option<Arc<C::Api>>>,
    writer: Mutex<()>,
}

impl<C: Connect> ClusterSession<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            client: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn initialize(&self, credential: &str) -> Result<(), AccessError> {
        let _writer = self.writer.lock().await;
        let api = self.connector.connect(credential).await?;
        *self.client.write().await = Some(Arc::new(api));
        info!("cluster client initialized");
        Ok(())
    }

    pub async fn client(&self) -> Result<Arc<C::Api>, AccessError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(AccessError::NotInitialized)
    }

    pub async fn is_initialized(&self) -> bool {
        self.client.read().await.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KubeConnector {
    read_timeout: Option<Duration>,
    verify_on_connect: bool,
}

impl KubeConnector {
    pub fn new(read_timeout: Option<Duration>, verify_on_connect: bool) -> Self {
        Self {
            read_timeout,
            verify_on_connect,
        }
    }
}

impl Connect for KubeConnector {
    type Api = KubePods;

    async fn connect(&self, credential: &str) -> Result<KubePods, AccessError> {
        let kubeconfig = Kubeconfig::from_yaml(credential)
            .map_err(|error| AccessError::invalid_credential(error.to_string()))?;
        let context = kubeconfig.current_context.clone();

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|error| AccessError::invalid_credential(error.to_string()))?;
        if let Some(timeout) = self.read_timeout {
            config.read_timeout = Some(timeout);
        }
        let cluster_url = config.cluster_url.to_string();

        let client = Client::try_from(config)
            .map_err(|error| AccessError::invalid_credential(error.to_string()))?;

        if self.verify_on_connect {
            let version = client.apiserver_version().await?;
            debug!(git_version = %version.git_version, "api server reachable");
        }

        info!(
            cluster = %cluster_url,
            context = context.as_deref().unwrap_or("-"),
            "connected kube client"
        );
        Ok(KubePods { client })
    }
}

#[derive(Clone)]
pub struct KubePods {
    client: Client,
}

impl KubePods {
    fn namespaced(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl PodApi for KubePods {
    async fn list_namespaced(&self, namespace: &str) -> Result<Vec<Pod>, AccessError> {
        let pods = self.namespaced(namespace);
        let list = pods.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn list_all(&self) -> Result<Vec<Pod>, AccessError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get(&self, id: &PodId) -> Result<Pod, AccessError> {
        Ok(self.namespaced(&id.namespace).get(&id.name).await?)
    }

    async fn replace(&self, id: &PodId, pod: &Pod) -> Result<Pod, AccessError> {
        Ok(self
            .namespaced(&id.namespace)
            .replace(&id.name, &PostParams::default(), pod)
            .await?)
    }

    async fn delete(&self, id: &PodId) -> Result<(), AccessError> {
        let _ = self
            .namespaced(&id.namespace)
            .delete(&id.name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
