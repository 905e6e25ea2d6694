use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;

use super::backend::DocumentBackend;
use super::error::BackendError;
use super::memory::MemoryBackend;
use super::protocol::{
    CollectionStats, CreateDocumentRequest, DocumentResponse, ENDPOINT_HEALTH, ErrorResponse,
    HEADER_IF_MATCH, HealthResponse, QueryRequest, QueryResponse,
};
use super::types::{DocumentKey, ETag, PartitionKey};

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Routes of a store node serving `backend`.
pub fn router(backend: Arc<MemoryBackend>) -> Router {
    Router::new()
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route("/collections/:collection/docs", post(handle_create))
        .route(
            "/collections/:collection/docs/:pk/:id",
            get(handle_read).put(handle_replace).delete(handle_delete),
        )
        .route("/collections/:collection/query", post(handle_query))
        .layer(Extension(backend))
}

fn reject(err: BackendError) -> HandlerError {
    let status = match &err {
        BackendError::Status { code, .. } => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        BackendError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        BackendError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        BackendError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match err {
        BackendError::Status { message, .. } => message,
        other => other.to_string(),
    };
    (status, Json(ErrorResponse { message }))
}

fn parse_key(pk: String, id: String) -> Result<DocumentKey, HandlerError> {
    PartitionKey::new(pk)
        .and_then(|pk| DocumentKey::new(id, pk))
        .map_err(|e| reject(BackendError::bad_request(e.to_string())))
}

fn if_match(headers: &HeaderMap) -> Result<Option<ETag>, HandlerError> {
    match headers.get(HEADER_IF_MATCH) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(ETag::new(v)))
            .map_err(|_| reject(BackendError::bad_request("If-Match header is not valid text"))),
    }
}

pub async fn handle_health(
    Extension(backend): Extension<Arc<MemoryBackend>>,
) -> (StatusCode, Json<HealthResponse>) {
    let collections = backend
        .collection_names()
        .into_iter()
        .map(|name| CollectionStats {
            partitions: backend.partition_count(&name),
            documents: backend.document_count(&name),
            name,
        })
        .collect();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            collections,
        }),
    )
}

pub async fn handle_read(
    Extension(backend): Extension<Arc<MemoryBackend>>,
    Path((collection, pk, id)): Path<(String, String, String)>,
) -> Result<(StatusCode, Json<DocumentResponse>), HandlerError> {
    let key = parse_key(pk, id)?;
    let doc = backend.read(&collection, &key).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(doc.into())))
}

pub async fn handle_create(
    Extension(backend): Extension<Arc<MemoryBackend>>,
    Path(collection): Path<String>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), HandlerError> {
    let key = req
        .key()
        .map_err(|e| reject(BackendError::bad_request(e.to_string())))?;
    match backend.create(&collection, &key, req.body).await {
        Ok(doc) => Ok((StatusCode::CREATED, Json(doc.into()))),
        Err(e) => {
            tracing::debug!("Create of {} in {} rejected: {}", key, collection, e);
            Err(reject(e))
        }
    }
}

pub async fn handle_replace(
    Extension(backend): Extension<Arc<MemoryBackend>>,
    Path((collection, pk, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<DocumentResponse>), HandlerError> {
    let key = parse_key(pk, id)?;
    let expected = if_match(&headers)?;
    let doc = backend
        .replace(&collection, &key, body, expected.as_ref())
        .await
        .map_err(reject)?;
    Ok((StatusCode::OK, Json(doc.into())))
}

pub async fn handle_delete(
    Extension(backend): Extension<Arc<MemoryBackend>>,
    Path((collection, pk, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, HandlerError> {
    let key = parse_key(pk, id)?;
    let expected = if_match(&headers)?;
    backend
        .delete(&collection, &key, expected.as_ref())
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_query(
    Extension(backend): Extension<Arc<MemoryBackend>>,
    Path(collection): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<(StatusCode, Json<QueryResponse>), HandlerError> {
    let page = backend
        .query(
            &collection,
            req.partition_key.as_ref(),
            req.continuation.as_ref(),
            req.max_items,
        )
        .await
        .map_err(reject)?;

    Ok((
        StatusCode::OK,
        Json(QueryResponse {
            documents: page.documents.into_iter().map(DocumentResponse::from).collect(),
            continuation: page.continuation,
        }),
    ))
}
