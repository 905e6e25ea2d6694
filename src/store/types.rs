//! Addressing, versioning and paging types shared by the client and the backends.

use super::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tokio::time::Instant;

/// Value that places a document in exactly one physical partition.
///
/// Never blank and never a bare `.` or `..`: a partition key can only be obtained
/// through [`PartitionKey::new`], which rejects such input before anything
/// reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(StoreError::MissingPartitionKey);
        }
        check_segment("partition key", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PartitionKey {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PartitionKey> for String {
    fn from(key: PartitionKey) -> Self {
        key.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full address of a single document: identifier plus the partition it lives in.
///
/// The store cannot resolve an identifier without its partition, so there is no
/// way to build a key from an identifier alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", try_from = "UncheckedKey")]
pub struct DocumentKey {
    pub id: String,
    pub partition_key: PartitionKey,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedKey {
    id: String,
    partition_key: PartitionKey,
}

impl TryFrom<UncheckedKey> for DocumentKey {
    type Error = StoreError;

    fn try_from(key: UncheckedKey) -> Result<Self> {
        Self::new(key.id, key.partition_key)
    }
}

impl DocumentKey {
    pub fn new(id: impl Into<String>, partition_key: PartitionKey) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StoreError::Validation("document id must not be empty".into()));
        }
        check_segment("document id", &id)?;
        Ok(Self { id, partition_key })
    }

    /// Builds a key from loosely-typed caller input, failing fast when the
    /// partition key is absent instead of letting a lookup fan out.
    pub fn parse(id: &str, partition_key: Option<&str>) -> Result<Self> {
        let partition_key = partition_key.ok_or(StoreError::MissingPartitionKey)?;
        Self::new(id, PartitionKey::new(partition_key)?)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.partition_key)
    }
}

/// Keys travel as URL path segments, where `.` and `..` are dot segments that
/// never reach the store node.
fn check_segment(what: &str, value: &str) -> Result<()> {
    if value == "." || value == ".." {
        return Err(StoreError::Validation(format!("{what} must not be '{value}'")));
    }
    Ok(())
}

/// Opaque version tag assigned by the store on every write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(format!("\"{}\"", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resume position of a paginated query, produced by the store.
///
/// Callers pass it back verbatim; its contents are deliberately not exposed.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token received from a store or from a caller.
    pub fn from_opaque(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    pub(crate) fn opaque(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContinuationToken(..)")
    }
}

/// An entity together with the store's system properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Versioned<T> {
    #[serde(flatten)]
    pub document: T,
    #[serde(rename = "_etag")]
    pub etag: ETag,
    /// Store-side modification time, seconds since the epoch.
    #[serde(rename = "_ts")]
    pub timestamp: i64,
}

/// One page of a list query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "continuation_token")]
    pub continuation: Option<ContinuationToken>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// A document as the backend sees it: schemaless body plus system properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    pub body: serde_json::Value,
    pub etag: ETag,
    pub timestamp: i64,
}

/// A page of raw documents as returned by a backend query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub documents: Vec<RawDocument>,
    pub continuation: Option<ContinuationToken>,
}

/// Creates a linked cancellation pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Fires the paired [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Cancellation signal observed by in-flight store operations.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        let handle_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if handle_dropped {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-call deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelSignal>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    pub fn cancel_on(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }
}
