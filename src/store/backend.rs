use super::error::BackendError;
use super::types::{ContinuationToken, DocumentKey, ETag, PartitionKey, RawDocument, RawPage};
use async_trait::async_trait;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Raw operations of a partitioned document store.
///
/// This is the boundary with the database itself. Implementations speak
/// schemaless JSON bodies, assign a fresh [`ETag`] and a non-decreasing
/// timestamp on every write, honour `if_match` preconditions, and report
/// failures with store-style status codes. They never classify or retry writes.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn read(&self, collection: &str, key: &DocumentKey) -> BackendResult<RawDocument>;

    /// Fails with 409 when the key already exists in its partition.
    async fn create(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
    ) -> BackendResult<RawDocument>;

    /// Fails with 404 when absent and 412 when `if_match` is not the current tag.
    async fn replace(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
        if_match: Option<&ETag>,
    ) -> BackendResult<RawDocument>;

    async fn delete(
        &self,
        collection: &str,
        key: &DocumentKey,
        if_match: Option<&ETag>,
    ) -> BackendResult<()>;

    /// Returns up to `max_items` documents, scoped to `partition` when given,
    /// resuming after `continuation`.
    async fn query(
        &self,
        collection: &str,
        partition: Option<&PartitionKey>,
        continuation: Option<&ContinuationToken>,
        max_items: usize,
    ) -> BackendResult<RawPage>;
}
