//! Independent, partially-failing batch execution.
//!
//! A batch is not a transaction: each item succeeds or fails on its own and the
//! report keeps one entry per input item, in input order. Items are grouped by
//! partition key; groups run concurrently, items inside a group run in order.

use super::error::{ErrorKind, Result, StoreError};
use super::patch::PatchOperation;
use super::types::{DocumentKey, ETag, PartitionKey};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

/// Partial update of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest<P> {
    #[serde(flatten)]
    pub key: DocumentKey,
    #[serde(rename = "_etag")]
    pub etag: ETag,
    pub changes: P,
}

/// Raw field-level patch of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    #[serde(flatten)]
    pub key: DocumentKey,
    #[serde(rename = "_etag")]
    pub etag: ETag,
    pub operations: Vec<PatchOperation>,
}

/// Removal of one document, optionally guarded by its tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(flatten)]
    pub key: DocumentKey,
    #[serde(rename = "_etag", default)]
    pub etag: Option<ETag>,
}

/// Outcome of a single batch item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItemResult<T> {
    Succeeded { index: usize, value: T },
    Failed { index: usize, kind: ErrorKind, message: String },
}

impl<T> BatchItemResult<T> {
    pub fn index(&self) -> usize {
        match self {
            BatchItemResult::Succeeded { index, .. } | BatchItemResult::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Succeeded { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            BatchItemResult::Failed { kind, .. } => Some(*kind),
            BatchItemResult::Succeeded { .. } => None,
        }
    }
}

/// Per-item results of a batch, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport<T> {
    pub results: Vec<BatchItemResult<T>>,
}

impl<T> BatchReport<T> {
    pub fn from_results(results: Vec<Result<T>>) -> Self {
        let results = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(value) => BatchItemResult::Succeeded { index, value },
                Err(e) => BatchItemResult::Failed {
                    index,
                    kind: e.kind(),
                    message: e.to_string(),
                },
            })
            .collect();
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs `op` over every item, grouped by `partition_of`, and returns results in
/// input order. Items without a known partition form their own group.
pub(crate) async fn run_grouped<I, R, K, F, Fut>(items: Vec<I>, partition_of: K, op: F) -> Vec<Result<R>>
where
    K: Fn(&I) -> Option<PartitionKey>,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let total = items.len();
    let mut groups: BTreeMap<Option<PartitionKey>, Vec<(usize, I)>> = BTreeMap::new();
    for (index, item) in items.into_iter().enumerate() {
        groups.entry(partition_of(&item)).or_default().push((index, item));
    }

    let op = &op;
    let group_runs = groups.into_values().map(|group| async move {
        let mut outcomes = Vec::with_capacity(group.len());
        for (index, item) in group {
            outcomes.push((index, op(item).await));
        }
        outcomes
    });

    let mut slots: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();
    for (index, result) in futures::future::join_all(group_runs).await.into_iter().flatten() {
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(StoreError::Unknown("batch item produced no result".into())))
        })
        .collect()
}
