use crate::error::{AccessError, Envelope};
use crate::model::{
    CREATE_SENTINEL_ID, DEFAULT_NAMESPACE, DeleteOutcome, NamespaceScope, PodFilter, PodId,
    PodPatch, PodRecord,
};
use crate::session::{ClusterSession, Connect, PodApi};
use crate::transform::to_record;
use futures::future::join_all;
use k8s_openapi::api::core::v1::{Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pod verbs over the live session client. Every call answers with an
/// [`Envelope`]; cluster and transport failures never escape as panics or
/// raw kube errors.
pub struct PodOperations<C: Connect> {
    session: Arc<ClusterSession<C>>,
    enforce_resource_version: bool,
}

impl<C: Connect> PodOperations<C> {
    pub fn new(session: Arc<ClusterSession<C>>) -> Self {
        Self {
            session,
            enforce_resource_version: false,
        }
    }

    /// Send the caller's `resourceVersion` with replacements so stale writes
    /// are rejected by the API server.
    pub fn enforce_resource_version(mut self, enabled: bool) -> Self {
        self.enforce_resource_version = enabled;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, filter: &PodFilter) -> Envelope<Vec<PodRecord>> {
        self.try_list(filter).await.into()
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_one(&self, id: &str) -> Envelope<PodRecord> {
        self.try_get_one(id).await.into()
    }

    /// Whole-object replace, not a merge: fields absent from `patch` are lost.
    #[tracing::instrument(skip(self, patch))]
    pub async fn replace(&self, id: &str, patch: &PodPatch) -> Envelope<PodRecord> {
        self.try_replace(id, patch).await.into()
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Envelope<String> {
        self.try_delete(id).await.into()
    }

    /// All-or-nothing: any failed deletion fails the whole call, and the
    /// caller cannot tell which of the other deletions went through.
    #[tracing::instrument(skip(self), fields(count = ids.len()))]
    pub async fn delete_many(&self, ids: &[String]) -> Envelope<Vec<String>> {
        self.try_delete_many(ids).await.into()
    }

    /// Same fan-out as [`Self::delete_many`], reported per id.
    #[tracing::instrument(skip(self), fields(count = ids.len()))]
    pub async fn delete_many_itemized(&self, ids: &[String]) -> Envelope<Vec<DeleteOutcome>> {
        self.try_delete_many_itemized(ids).await.into()
    }

    async fn try_list(&self, filter: &PodFilter) -> Result<Vec<PodRecord>, AccessError> {
        let api = self.session.client().await?;
        let pods = match filter.scope() {
            NamespaceScope::Named(namespace) => api.list_namespaced(&namespace).await?,
            NamespaceScope::All => api.list_all().await?,
        };
        let fetched = pods.len();
        let records = pods
            .iter()
            .map(to_record)
            .filter(|record| filter.matches(record))
            .collect::<Vec<_>>();
        debug!(fetched, matched = records.len(), "listed pods");
        Ok(records)
    }

    async fn try_get_one(&self, id: &str) -> Result<PodRecord, AccessError> {
        let api = self.session.client().await?;
        let id = PodId::parse(id)?;
        let pod = api.get(&id).await?;
        Ok(to_record(&pod))
    }

    async fn try_replace(&self, id: &str, patch: &PodPatch) -> Result<PodRecord, AccessError> {
        let api = self.session.client().await?;
        let target = replace_target(id, patch)?;
        let document = build_document(&target, patch, self.enforce_resource_version)?;
        let replaced = api.replace(&target, &document).await?;
        Ok(to_record(&replaced))
    }

    async fn try_delete(&self, id: &str) -> Result<String, AccessError> {
        let api = self.session.client().await?;
        api.delete(&PodId::parse(id)?).await?;
        Ok(id.to_string())
    }

    async fn try_delete_many(&self, ids: &[String]) -> Result<Vec<String>, AccessError> {
        let outcomes = self.fan_out_delete(ids).await?;
        let failed = outcomes
            .iter()
            .filter(|(_, result)| result.is_err())
            .count();
        if let Some((id, Err(error))) = outcomes.into_iter().find(|(_, result)| result.is_err()) {
            warn!(failed, first = %id, "bulk delete failed");
            return Err(error);
        }
        Ok(ids.to_vec())
    }

    async fn try_delete_many_itemized(
        &self,
        ids: &[String],
    ) -> Result<Vec<DeleteOutcome>, AccessError> {
        let outcomes = self.fan_out_delete(ids).await?;
        Ok(outcomes
            .into_iter()
            .map(|(id, result)| DeleteOutcome {
                id,
                deleted: result.is_ok(),
                error: result.err(),
            })
            .collect())
    }

    async fn fan_out_delete(
        &self,
        ids: &[String],
    ) -> Result<Vec<(String, Result<(), AccessError>)>, AccessError> {
        let api = self.session.client().await?;
        let deletions = ids.iter().map(|id| {
            let api = Arc::clone(&api);
            async move {
                let result = match PodId::parse(id) {
                    Ok(pod_id) => api.delete(&pod_id).await,
                    Err(error) => Err(error),
                };
                (id.clone(), result)
            }
        });
        Ok(join_all(deletions).await)
    }
}

// "new" is the create sentinel: the target comes from the patch itself.
fn replace_target(id: &str, patch: &PodPatch) -> Result<PodId, AccessError> {
    if id != CREATE_SENTINEL_ID {
        return PodId::parse(id);
    }

    let name = patch
        .name
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AccessError::invalid_input("a pod name is required to create a pod"))?;
    let namespace = patch
        .namespace
        .as_deref()
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE);
    Ok(PodId::new(namespace, name))
}

fn build_document(
    target: &PodId,
    patch: &PodPatch,
    keep_resource_version: bool,
) -> Result<Pod, AccessError> {
    let spec = if patch.spec.is_null() {
        None
    } else {
        let spec = serde_json::from_value::<PodSpec>(patch.spec.clone())
            .map_err(|error| AccessError::invalid_input(format!("invalid pod spec: {error}")))?;
        Some(spec)
    };

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(patch.name.clone().unwrap_or_else(|| target.name.clone())),
            namespace: Some(
                patch
                    .namespace
                    .clone()
                    .unwrap_or_else(|| target.namespace.clone()),
            ),
            labels: patch.labels.clone(),
            annotations: patch.annotations.clone(),
            resource_version: patch
                .resource_version
                .clone()
                .filter(|_| keep_resource_version),
            ..ObjectMeta::default()
        },
        spec,
        ..Pod::default()
    })
}
