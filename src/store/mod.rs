//! Partitioned Document Store Module
//!
//! Typed access to a document store whose documents live in partitions and
//! carry optimistic-concurrency tags.
//!
//! ## Core Concepts
//! - **Addressing**: A document is reached through a `DocumentKey` (id + partition key), never by id alone.
//! - **Versioning**: Every write yields a fresh `ETag`; mutations must present the current one.
//! - **Paging**: List queries return opaque `ContinuationToken`s that are passed back verbatim.
//! - **Batches**: Per-item, partially-failing batches grouped by partition.
//! - **Backends**: `MemoryBackend` (in-process) and `HttpBackend` (remote store node) behind `DocumentBackend`.

pub mod backend;
pub mod batch;
pub mod client;
pub mod document;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod patch;
pub mod protocol;
pub mod remote;
pub mod types;

pub use backend::DocumentBackend;
pub use batch::{BatchItemResult, BatchReport, DeleteRequest, PatchRequest, UpdateRequest};
pub use client::{DocumentStore, Pager, StoreLimits};
pub use document::Document;
pub use error::{BackendError, ErrorKind, Result, StoreError};
pub use memory::MemoryBackend;
pub use patch::PatchOperation;
pub use remote::HttpBackend;
pub use types::{
    CancelHandle, CancelSignal, ContinuationToken, DocumentKey, ETag, Page, PartitionKey,
    RequestOptions, Versioned, cancel_pair,
};
