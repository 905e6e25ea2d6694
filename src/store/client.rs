//! Partitioned document store client.
//!
//! `DocumentStore<T>` is the only way the rest of the crate touches documents.
//! It enforces three rules on top of any [`DocumentBackend`]:
//!
//! * every point operation is addressed by a full [`DocumentKey`];
//! * every mutation other than create carries the caller's [`ETag`] and fails
//!   with `PreconditionFailed` instead of overwriting a newer version;
//! * every backend failure leaves as a classified [`StoreError`].
//!
//! Deadlines and cancellation come from [`RequestOptions`]. Expiry surfaces as
//! `Timeout`; a write interrupted mid-flight may or may not have committed.

use super::backend::DocumentBackend;
use super::batch::{self, BatchReport, DeleteRequest, PatchRequest, UpdateRequest};
use super::document::Document;
use super::error::{BackendError, ErrorKind, Result, StoreError};
use super::patch::{self, PatchOperation};
use super::types::{
    ContinuationToken, DocumentKey, ETag, Page, PartitionKey, RawDocument, RequestOptions,
    Versioned,
};

use chrono::Utc;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Page and batch bounds applied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub max_batch_size: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
            max_batch_size: 100,
        }
    }
}

pub struct DocumentStore<T: Document> {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    limits: StoreLimits,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for DocumentStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            collection: self.collection.clone(),
            limits: self.limits,
            _entity: PhantomData,
        }
    }
}

impl<T: Document> DocumentStore<T> {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            collection: T::COLLECTION.to_string(),
            limits: StoreLimits::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    // ============================================================
    // Point operations
    // ============================================================

    pub async fn get(&self, key: &DocumentKey, options: &RequestOptions) -> Result<Versioned<T>> {
        run("get", options, async {
            let raw = self.read_raw("get", key).await?;
            self.decode("get", key, raw)
        })
        .await
    }

    /// Creates `entity`, assigning its identifier first. Fails with `Conflict`
    /// when the identifier is already taken within the partition.
    pub async fn create(&self, mut entity: T, options: &RequestOptions) -> Result<Versioned<T>> {
        entity.assign_id()?;
        entity.stamp_created(Utc::now());
        entity.validate()?;
        let key = key_of(&entity)?;
        let body = serde_json::to_value(&entity)?;

        run("create", options, async {
            let raw = self
                .backend
                .create(&self.collection, &key, body)
                .await
                .map_err(|e| self.classify("create", &key, e))?;
            tracing::debug!("Created {} in {}", key, self.collection);
            self.decode("create", &key, raw)
        })
        .await
    }

    /// Merges `patch` into the current document. The patch is never applied
    /// when `expected` is not the current tag, and an empty patch is rejected
    /// without touching the stored version.
    pub async fn update(
        &self,
        key: &DocumentKey,
        patch: T::Patch,
        expected: &ETag,
        options: &RequestOptions,
    ) -> Result<Versioned<T>> {
        if T::patch_is_empty(&patch) {
            return Err(StoreError::Validation("no fields provided for update".into()));
        }
        run("update", options, async {
            let current = self.read_current("update", key, expected).await?;
            let mut document = self.decode("update", key, current)?.document;
            document.apply_patch(patch)?;
            self.write_back("update", key, document, expected).await
        })
        .await
    }

    /// Replaces the whole document. Identifier and partition key of `entity`
    /// must match `key`.
    pub async fn replace(
        &self,
        key: &DocumentKey,
        mut entity: T,
        expected: &ETag,
        options: &RequestOptions,
    ) -> Result<Versioned<T>> {
        if entity.id().is_none() {
            entity.assign_id()?;
        }
        run("replace", options, async {
            self.write_back("replace", key, entity, expected).await
        })
        .await
    }

    /// Applies raw field-level operations to the stored JSON. The identifier,
    /// the partition key and system properties cannot be targeted.
    pub async fn patch(
        &self,
        key: &DocumentKey,
        operations: &[PatchOperation],
        expected: &ETag,
        options: &RequestOptions,
    ) -> Result<Versioned<T>> {
        patch::ensure_not_protected(operations, &T::immutable_fields())?;

        run("patch", options, async {
            let current = self.read_current("patch", key, expected).await?;
            let mut body = current.body;
            patch::apply(&mut body, operations)?;
            let document: T = serde_json::from_value(body)?;
            self.write_back("patch", key, document, expected).await
        })
        .await
    }

    /// Deletes the document; with `expected`, only if it is still that version.
    pub async fn delete(
        &self,
        key: &DocumentKey,
        expected: Option<&ETag>,
        options: &RequestOptions,
    ) -> Result<()> {
        run("delete", options, async {
            self.backend
                .delete(&self.collection, key, expected)
                .await
                .map_err(|e| self.classify("delete", key, e))?;
            tracing::debug!("Deleted {} from {}", key, self.collection);
            Ok(())
        })
        .await
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Returns one page of documents. Without a partition the whole collection
    /// is scanned. Documents that no longer decode are skipped.
    pub async fn list(
        &self,
        partition: Option<&PartitionKey>,
        continuation: Option<&ContinuationToken>,
        page_size: Option<usize>,
        options: &RequestOptions,
    ) -> Result<Page<Versioned<T>>> {
        let page_size = self.page_size(page_size)?;
        if partition.is_none() {
            tracing::warn!(
                "Listing {} without a partition key scans every partition",
                self.collection
            );
        }

        run("list", options, async {
            let target = match partition {
                Some(pk) => format!("{}/{}", self.collection, pk),
                None => self.collection.clone(),
            };
            let page = self
                .backend
                .query(&self.collection, partition, continuation, page_size)
                .await
                .map_err(|e| self.classify("list", &target, e))?;

            let mut items = Vec::with_capacity(page.documents.len());
            for raw in page.documents {
                match decode_raw::<T>(raw) {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        tracing::warn!("Skipping undecodable document in {}: {}", target, e)
                    }
                }
            }

            Ok(Page {
                items,
                continuation: page.continuation,
            })
        })
        .await
    }

    /// Lazily walks every page of a partition (or the whole collection).
    pub fn pages(&self, partition: Option<PartitionKey>, page_size: Option<usize>) -> Pager<'_, T> {
        Pager {
            store: self,
            partition,
            page_size,
            next: None,
            finished: false,
        }
    }

    // ============================================================
    // Batches
    // ============================================================

    pub async fn batch_create(
        &self,
        entities: Vec<T>,
        options: &RequestOptions,
    ) -> Result<BatchReport<Versioned<T>>> {
        self.check_batch_size(entities.len())?;

        // Identifiers first, so entities partitioned by their own id group correctly.
        let prepared: Vec<Result<T>> = entities
            .into_iter()
            .map(|mut entity| entity.assign_id().map(|_| entity))
            .collect();

        let results = batch::run_grouped(
            prepared,
            |item| item.as_ref().ok().and_then(|e| e.partition_key().ok()),
            |item| async move { self.create(item?, options).await },
        )
        .await;
        Ok(self.report("create", results))
    }

    pub async fn batch_update(
        &self,
        requests: Vec<UpdateRequest<T::Patch>>,
        options: &RequestOptions,
    ) -> Result<BatchReport<Versioned<T>>> {
        self.check_batch_size(requests.len())?;
        let results = batch::run_grouped(
            requests,
            |req| Some(req.key.partition_key.clone()),
            |req| async move {
                self.update(&req.key, req.changes, &req.etag, options)
                    .await
            },
        )
        .await;
        Ok(self.report("update", results))
    }

    pub async fn batch_patch(
        &self,
        requests: Vec<PatchRequest>,
        options: &RequestOptions,
    ) -> Result<BatchReport<Versioned<T>>> {
        self.check_batch_size(requests.len())?;
        let results = batch::run_grouped(
            requests,
            |req| Some(req.key.partition_key.clone()),
            |req| async move {
                self.patch(&req.key, &req.operations, &req.etag, options)
                    .await
            },
        )
        .await;
        Ok(self.report("patch", results))
    }

    pub async fn batch_delete(
        &self,
        requests: Vec<DeleteRequest>,
        options: &RequestOptions,
    ) -> Result<BatchReport<DocumentKey>> {
        self.check_batch_size(requests.len())?;
        let results = batch::run_grouped(
            requests,
            |req| Some(req.key.partition_key.clone()),
            |req| async move {
                self.delete(&req.key, req.etag.as_ref(), options).await?;
                Ok(req.key)
            },
        )
        .await;
        Ok(self.report("delete", results))
    }

    // ============================================================
    // Internals
    // ============================================================

    async fn read_raw(&self, operation: &'static str, key: &DocumentKey) -> Result<RawDocument> {
        self.backend
            .read(&self.collection, key)
            .await
            .map_err(|e| self.classify(operation, key, e))
    }

    /// Reads the document and checks it is still at `expected`.
    async fn read_current(
        &self,
        operation: &'static str,
        key: &DocumentKey,
        expected: &ETag,
    ) -> Result<RawDocument> {
        let current = self.read_raw(operation, key).await?;
        if &current.etag != expected {
            tracing::debug!("{} of {} rejected: stale etag {}", operation, key, expected);
            return Err(StoreError::PreconditionFailed(key.to_string()));
        }
        Ok(current)
    }

    /// Stamps, validates and conditionally writes a full document at `key`.
    async fn write_back(
        &self,
        operation: &'static str,
        key: &DocumentKey,
        mut document: T,
        expected: &ETag,
    ) -> Result<Versioned<T>> {
        let written_key = key_of(&document)?;
        if &written_key != key {
            return Err(StoreError::Validation(format!(
                "identifier and partition key cannot change: {} became {}",
                key, written_key
            )));
        }
        document.touch(Utc::now());
        document.validate()?;

        let body = serde_json::to_value(&document)?;
        let raw = self
            .backend
            .replace(&self.collection, key, body, Some(expected))
            .await
            .map_err(|e| self.classify(operation, key, e))?;
        self.decode(operation, key, raw)
    }

    fn decode(
        &self,
        operation: &'static str,
        key: &DocumentKey,
        raw: RawDocument,
    ) -> Result<Versioned<T>> {
        decode_raw(raw).map_err(|e| {
            tracing::error!(
                "{} of {} in {} returned an undecodable document: {}",
                operation,
                key,
                self.collection,
                e
            );
            StoreError::Unknown(format!("stored document {} does not decode: {}", key, e))
        })
    }

    fn classify(&self, operation: &'static str, target: &dyn Display, err: BackendError) -> StoreError {
        let target = target.to_string();
        let classified = StoreError::from_backend(operation, &target, err);
        let collection = &self.collection;
        match classified.kind() {
            ErrorKind::Unknown => {
                tracing::error!("{operation} on {target} in {collection} failed: {classified}")
            }
            ErrorKind::Unavailable | ErrorKind::Timeout => {
                tracing::warn!("{operation} on {target} in {collection} failed: {classified}")
            }
            _ => tracing::debug!("{operation} on {target} in {collection}: {classified}"),
        }
        classified
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        let size = requested.unwrap_or(self.limits.default_page_size);
        if size == 0 || size > self.limits.max_page_size {
            return Err(StoreError::Validation(format!(
                "page size must be between 1 and {}, got {}",
                self.limits.max_page_size, size
            )));
        }
        Ok(size)
    }

    fn check_batch_size(&self, len: usize) -> Result<()> {
        if len > self.limits.max_batch_size {
            return Err(StoreError::Validation(format!(
                "batch of {} items exceeds the limit of {}",
                len, self.limits.max_batch_size
            )));
        }
        Ok(())
    }

    fn report<R>(&self, operation: &str, results: Vec<Result<R>>) -> BatchReport<R> {
        let report = BatchReport::from_results(results);
        tracing::info!(
            "Batch {} on {}: {} succeeded, {} failed",
            operation,
            self.collection,
            report.succeeded(),
            report.failed()
        );
        report
    }
}

/// Follows continuation tokens page by page. Finite for a static dataset;
/// restart by asking the store for a new pager.
pub struct Pager<'a, T: Document> {
    store: &'a DocumentStore<T>,
    partition: Option<PartitionKey>,
    page_size: Option<usize>,
    next: Option<ContinuationToken>,
    finished: bool,
}

impl<T: Document> Pager<'_, T> {
    /// Fetches the next page, or `None` once the last page has been returned.
    pub async fn next_page(&mut self, options: &RequestOptions) -> Result<Option<Page<Versioned<T>>>> {
        if self.finished {
            return Ok(None);
        }
        let page = self
            .store
            .list(self.partition.as_ref(), self.next.as_ref(), self.page_size, options)
            .await?;
        self.next = page.continuation.clone();
        self.finished = page.is_last();
        Ok(Some(page))
    }

    pub async fn collect_all(mut self, options: &RequestOptions) -> Result<Vec<Versioned<T>>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page(options).await? {
            all.extend(page.items);
        }
        Ok(all)
    }
}

fn key_of<T: Document>(entity: &T) -> Result<DocumentKey> {
    let id = entity
        .id()
        .ok_or_else(|| StoreError::Validation("document has no id".into()))?;
    DocumentKey::new(id, entity.partition_key()?)
}

fn decode_raw<T: Document>(raw: RawDocument) -> std::result::Result<Versioned<T>, serde_json::Error> {
    Ok(Versioned {
        document: serde_json::from_value(raw.body)?,
        etag: raw.etag,
        timestamp: raw.timestamp,
    })
}

/// Runs `work` under the deadline and cancellation signal of `options`.
async fn run<R, F>(operation: &'static str, options: &RequestOptions, work: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    if let Some(cancel) = &options.cancel
        && cancel.is_cancelled()
    {
        return Err(StoreError::Cancelled { operation });
    }
    if let Some(deadline) = options.deadline
        && deadline <= tokio::time::Instant::now()
    {
        return Err(StoreError::Timeout { operation });
    }

    let bounded = async {
        match options.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, work)
                .await
                .map_err(|_| StoreError::Timeout { operation })?,
            None => work.await,
        }
    };

    match &options.cancel {
        Some(cancel) => tokio::select! {
            result = bounded => result,
            _ = cancel.cancelled() => {
                tracing::debug!("{} cancelled by caller", operation);
                Err(StoreError::Cancelled { operation })
            }
        },
        None => bounded.await,
    }
}
