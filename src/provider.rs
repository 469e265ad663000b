use crate::error::AccessError;
use crate::model::{CREATE_SENTINEL_ID, DeleteOutcome, POD_RESOURCE, PodFilter, PodPatch, PodRecord};
use crate::pods::PodOperations;
use crate::session::Connect;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: "name".to_string(),
            order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetListParams {
    pub pagination: Pagination,
    pub sort: Sort,
    pub filter: PodFilter,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GetManyReferenceParams {
    pub target: String,
    pub id: String,
    #[serde(flatten)]
    pub list: GetListParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetListResult {
    pub data: Vec<PodRecord>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataResult<T> {
    pub data: T,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Rejected(AccessError),
    #[error("Failed to {action}: {source}")]
    Failed {
        action: &'static str,
        source: AccessError,
    },
}

impl ProviderError {
    pub fn access_error(&self) -> &AccessError {
        match self {
            Self::Rejected(error) | Self::Failed { source: error, .. } => error,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.access_error().status()
    }
}

fn failed(action: &'static str) -> impl FnOnce(AccessError) -> ProviderError {
    move |source| ProviderError::Failed { action, source }
}

fn ensure_supported(resource: &str) -> Result<(), ProviderError> {
    if resource == POD_RESOURCE {
        Ok(())
    } else {
        Err(ProviderError::Rejected(AccessError::unsupported(resource)))
    }
}

/// Generic CRUD adapter over [`PodOperations`] for the one supported
/// resource, `pods`.
pub struct DataProvider<C: Connect> {
    operations: PodOperations<C>,
}

impl<C: Connect> DataProvider<C> {
    pub fn new(operations: PodOperations<C>) -> Self {
        Self { operations }
    }

    pub async fn get_list(
        &self,
        resource: &str,
        params: &GetListParams,
    ) -> Result<GetListResult, ProviderError> {
        ensure_supported(resource)?;
        let records = self
            .operations
            .list(&params.filter)
            .await
            .into_result()
            .map_err(failed("fetch pods"))?;
        let sorted = sort_records(records, &params.sort);
        Ok(paginate(sorted, params.pagination))
    }

    pub async fn get_one(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<DataResult<PodRecord>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .get_one(id)
            .await
            .into_result()
            .map_err(failed("fetch pod"))?;
        Ok(DataResult { data })
    }

    /// Ids that cannot be fetched are left out of the result.
    pub async fn get_many(
        &self,
        resource: &str,
        ids: &[String],
    ) -> Result<DataResult<Vec<PodRecord>>, ProviderError> {
        ensure_supported(resource)?;
        let fetched = join_all(ids.iter().map(|id| self.operations.get_one(id))).await;
        let data = ids
            .iter()
            .zip(fetched)
            .filter_map(|(id, envelope)| match envelope.into_result() {
                Ok(record) => Some(record),
                Err(error) => {
                    debug!(%id, %error, "dropping unresolved id");
                    None
                }
            })
            .collect();
        Ok(DataResult { data })
    }

    pub async fn get_many_reference(
        &self,
        resource: &str,
        params: &GetManyReferenceParams,
    ) -> Result<GetListResult, ProviderError> {
        let mut list = params.list.clone();
        if !list.filter.set_key(&params.target, params.id.clone()) {
            debug!(reference = %params.target, "ignoring unknown reference target");
        }
        self.get_list(resource, &list).await
    }

    /// Creation goes through the replace verb with the `new` sentinel id.
    pub async fn create(
        &self,
        resource: &str,
        data: &PodPatch,
    ) -> Result<DataResult<PodRecord>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .replace(CREATE_SENTINEL_ID, data)
            .await
            .into_result()
            .map_err(failed("create pod"))?;
        Ok(DataResult { data })
    }

    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        data: &PodPatch,
    ) -> Result<DataResult<PodRecord>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .replace(id, data)
            .await
            .into_result()
            .map_err(failed("update pod"))?;
        Ok(DataResult { data })
    }

    /// Applies `update` to each id in turn, stopping at the first failure.
    pub async fn update_many(
        &self,
        resource: &str,
        ids: &[String],
        data: &PodPatch,
    ) -> Result<DataResult<Vec<String>>, ProviderError> {
        ensure_supported(resource)?;
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self
                .operations
                .replace(id, data)
                .await
                .into_result()
                .map_err(failed("update pods"))?;
            updated.push(record.id);
        }
        Ok(DataResult { data: updated })
    }

    pub async fn delete(
        &self,
        resource: &str,
        id: &str,
    ) -> Result<DataResult<String>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .delete(id)
            .await
            .into_result()
            .map_err(failed("delete pod"))?;
        Ok(DataResult { data })
    }

    pub async fn delete_many(
        &self,
        resource: &str,
        ids: &[String],
    ) -> Result<DataResult<Vec<String>>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .delete_many(ids)
            .await
            .into_result()
            .map_err(failed("delete pods"))?;
        Ok(DataResult { data })
    }

    pub async fn delete_many_itemized(
        &self,
        resource: &str,
        ids: &[String],
    ) -> Result<DataResult<Vec<DeleteOutcome>>, ProviderError> {
        ensure_supported(resource)?;
        let data = self
            .operations
            .delete_many_itemized(ids)
            .await
            .into_result()
            .map_err(failed("delete pods"))?;
        Ok(DataResult { data })
    }
}

/// Stable sort on the serialized field value; equal keys keep their input order.
fn sort_records(records: Vec<PodRecord>, sort: &Sort) -> Vec<PodRecord> {
    let mut keyed = records
        .into_iter()
        .map(|record| (sort_key(&record, &sort.field), record))
        .collect::<Vec<_>>();
    keyed.sort_by(|(left, _), (right, _)| {
        let ordering = compare_values(left, right);
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    keyed.into_iter().map(|(_, record)| record).collect()
}

// Exact top-level key first, then a dotted path (`spec.nodeName`, `containers.0.name`).
fn sort_key(record: &PodRecord, field: &str) -> Value {
    let Ok(value) = serde_json::to_value(record) else {
        return Value::Null;
    };
    if let Some(direct) = value.get(field) {
        return direct.clone();
    }

    field
        .split('.')
        .try_fold(&value, |current, segment| match current {
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => current.get(segment),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn value_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => {
            let left = left.as_f64().unwrap_or(0.0);
            let right = right.as_f64().unwrap_or(0.0);
            left.total_cmp(&right)
        }
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            left.to_string().cmp(&right.to_string())
        }
        _ => value_rank(left).cmp(&value_rank(right)),
    }
}

fn paginate(records: Vec<PodRecord>, pagination: Pagination) -> GetListResult {
    let total = records.len();
    let start = pagination
        .page
        .max(1)
        .saturating_sub(1)
        .saturating_mul(pagination.per_page);
    let data = records
        .into_iter()
        .skip(start)
        .take(pagination.per_page)
        .collect();
    GetListResult { data, total }
}
