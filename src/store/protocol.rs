//! Store Node Wire Protocol
//!
//! Defines the endpoints and Data Transfer Objects (DTOs) exchanged between an
//! `HttpBackend` and a store node. Documents travel as JSON; concurrency tags
//! travel in the `If-Match` header on writes and in the body on reads.

use super::error::Result;
use super::types::{ContinuationToken, DocumentKey, ETag, PartitionKey, RawDocument};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Liveness probe.
pub const ENDPOINT_HEALTH: &str = "/health";
/// Prefix of every collection-scoped endpoint.
pub const ENDPOINT_COLLECTIONS: &str = "collections";
/// Segment under a collection addressing single documents.
pub const SEGMENT_DOCS: &str = "docs";
/// Segment under a collection for paginated queries.
pub const SEGMENT_QUERY: &str = "query";

/// Header carrying the expected concurrency tag of a write.
pub const HEADER_IF_MATCH: &str = "if-match";

// --- Data Transfer Objects ---

/// Body of a create request. The key travels with the body because the
/// document does not exist yet and has no address.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub partition_key: PartitionKey,
    pub id: String,
    pub body: serde_json::Value,
}

impl CreateDocumentRequest {
    pub fn key(&self) -> Result<DocumentKey> {
        DocumentKey::new(self.id.clone(), self.partition_key.clone())
    }
}

/// A stored document with its system properties.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub body: serde_json::Value,
    #[serde(rename = "_etag")]
    pub etag: ETag,
    #[serde(rename = "_ts")]
    pub timestamp: i64,
}

impl From<RawDocument> for DocumentResponse {
    fn from(doc: RawDocument) -> Self {
        Self {
            body: doc.body,
            etag: doc.etag,
            timestamp: doc.timestamp,
        }
    }
}

impl From<DocumentResponse> for RawDocument {
    fn from(doc: DocumentResponse) -> Self {
        Self {
            body: doc.body,
            etag: doc.etag,
            timestamp: doc.timestamp,
        }
    }
}

/// Paginated query. Omitting `partition_key` queries the whole collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub partition_key: Option<PartitionKey>,
    pub continuation: Option<ContinuationToken>,
    pub max_items: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub documents: Vec<DocumentResponse>,
    pub continuation: Option<ContinuationToken>,
}

/// Body of every non-success response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub collections: Vec<CollectionStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub partitions: usize,
    pub documents: usize,
}
