//! Inventory API Wire Protocol
//!
//! Paths, query parameters and response bodies of the inventory HTTP API.

use crate::store::{ErrorKind, StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_PRODUCTS: &str = "/products";
pub const ENDPOINT_LOCATIONS: &str = "/locations";
pub const ENDPOINT_INVENTORY: &str = "/inventory";

// --- Parameters ---

/// Query parameter carrying the continuation token of a list call.
pub const PARAM_CONTINUATION: &str = "continuation_token";
/// Query parameter bounding the size of a list page.
pub const PARAM_MAX_ITEMS: &str = "max_items";
/// Body field carrying the expected concurrency tag of an update.
pub const FIELD_ETAG: &str = "_etag";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// A classified store failure on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = StatusCode::from_u16(kind.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self.0);
        }
        let body = ErrorBody {
            kind,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
