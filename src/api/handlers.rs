use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode, header::IF_MATCH},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::protocol::{ApiError, FIELD_ETAG, HealthResponse, PARAM_CONTINUATION, PARAM_MAX_ITEMS};
use crate::store::{
    BatchReport, ContinuationToken, DeleteRequest, Document, DocumentKey, DocumentStore, ETag,
    Page, PartitionKey, PatchRequest, RequestOptions, StoreError, UpdateRequest, Versioned,
};

/// Everything a handler needs to serve one collection.
pub struct CollectionState<T: Document> {
    pub store: DocumentStore<T>,
    pub request_timeout: Duration,
}

impl<T: Document> CollectionState<T> {
    fn options(&self) -> RequestOptions {
        RequestOptions::with_timeout(self.request_timeout)
    }
}

type State<T> = Extension<Arc<CollectionState<T>>>;
type Params = Query<HashMap<String, String>>;

fn parse_body<B: DeserializeOwned>(body: Value) -> Result<B, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError(StoreError::from(e)))
}

/// Resolves the document key from the path id and the entity's partition-key
/// parameter. Entities partitioned by their own id need no parameter.
fn key_from<T: Document>(id: &str, params: &HashMap<String, String>) -> Result<DocumentKey, ApiError> {
    let partition_key = if T::PARTITION_KEY_FIELD == "id" {
        Some(id)
    } else {
        params.get(T::PARTITION_KEY_FIELD).map(String::as_str)
    };
    Ok(DocumentKey::parse(id, partition_key)?)
}

fn batch_status<R>(report: &BatchReport<R>) -> StatusCode {
    if report.all_succeeded() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    }
}

pub async fn handle_health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

pub async fn handle_list<T: Document>(
    Extension(state): State<T>,
    Query(params): Params,
) -> Result<(StatusCode, Json<Page<Versioned<T>>>), ApiError> {
    let partition = params
        .get(T::PARTITION_KEY_FIELD)
        .map(|pk| PartitionKey::new(pk.as_str()))
        .transpose()?;
    let continuation = params
        .get(PARAM_CONTINUATION)
        .map(|token| ContinuationToken::from_opaque(token.as_str()));
    let page_size = params
        .get(PARAM_MAX_ITEMS)
        .map(|raw| {
            raw.parse::<usize>().map_err(|_| {
                StoreError::Validation(format!("{PARAM_MAX_ITEMS} must be a positive integer"))
            })
        })
        .transpose()?;

    let page = state
        .store
        .list(
            partition.as_ref(),
            continuation.as_ref(),
            page_size,
            &state.options(),
        )
        .await?;
    Ok((StatusCode::OK, Json(page)))
}

pub async fn handle_create<T: Document>(
    Extension(state): State<T>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Versioned<T>>), ApiError> {
    let entity: T = parse_body(body)?;
    let created = state.store.create(entity, &state.options()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn handle_get<T: Document>(
    Extension(state): State<T>,
    Path(id): Path<String>,
    Query(params): Params,
) -> Result<(StatusCode, Json<Versioned<T>>), ApiError> {
    let key = key_from::<T>(&id, &params)?;
    let found = state.store.get(&key, &state.options()).await?;
    Ok((StatusCode::OK, Json(found)))
}

/// Partial update. The body holds the changed fields plus `_etag`.
pub async fn handle_update<T: Document>(
    Extension(state): State<T>,
    Path(id): Path<String>,
    Query(params): Params,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Versioned<T>>), ApiError> {
    let key = key_from::<T>(&id, &params)?;
    let Value::Object(mut fields) = body else {
        return Err(StoreError::Validation("update body must be a JSON object".into()).into());
    };
    let etag = match fields.remove(FIELD_ETAG) {
        Some(Value::String(tag)) => ETag::new(tag),
        _ => return Err(StoreError::Validation(format!("{FIELD_ETAG} is required")).into()),
    };
    let patch: T::Patch = parse_body(Value::Object(fields))?;

    let updated = state
        .store
        .update(&key, patch, &etag, &state.options())
        .await?;
    Ok((StatusCode::OK, Json(updated)))
}

pub async fn handle_delete<T: Document>(
    Extension(state): State<T>,
    Path(id): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let key = key_from::<T>(&id, &params)?;
    let expected = match headers.get(IF_MATCH) {
        Some(value) => Some(ETag::new(value.to_str().map_err(|_| {
            StoreError::Validation("If-Match header is not valid text".into())
        })?)),
        None => None,
    };

    state
        .store
        .delete(&key, expected.as_ref(), &state.options())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Batches
// ============================================================

pub async fn handle_batch_create<T: Document>(
    Extension(state): State<T>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<BatchReport<Versioned<T>>>), ApiError> {
    let entities: Vec<T> = parse_body(body)?;
    let report = state
        .store
        .batch_create(entities, &state.options())
        .await?;
    Ok((batch_status(&report), Json(report)))
}

pub async fn handle_batch_update<T: Document>(
    Extension(state): State<T>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<BatchReport<Versioned<T>>>), ApiError> {
    let requests: Vec<UpdateRequest<T::Patch>> = parse_body(body)?;
    let report = state
        .store
        .batch_update(requests, &state.options())
        .await?;
    Ok((batch_status(&report), Json(report)))
}

pub async fn handle_batch_patch<T: Document>(
    Extension(state): State<T>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<BatchReport<Versioned<T>>>), ApiError> {
    let requests: Vec<PatchRequest> = parse_body(body)?;
    let report = state
        .store
        .batch_patch(requests, &state.options())
        .await?;
    Ok((batch_status(&report), Json(report)))
}

pub async fn handle_batch_delete<T: Document>(
    Extension(state): State<T>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<BatchReport<DocumentKey>>), ApiError> {
    let requests: Vec<DeleteRequest> = parse_body(body)?;
    let report = state
        .store
        .batch_delete(requests, &state.options())
        .await?;
    Ok((batch_status(&report), Json(report)))
}
