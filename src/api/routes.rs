use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

use super::handlers::*;
use super::protocol::{ENDPOINT_HEALTH, ENDPOINT_INVENTORY, ENDPOINT_LOCATIONS, ENDPOINT_PRODUCTS};
use crate::inventory::InventoryStores;
use crate::store::{Document, DocumentStore};

/// The full inventory API over `stores`. Every request runs under `request_timeout`.
pub fn router(stores: InventoryStores, request_timeout: Duration) -> Router {
    Router::new()
        .route(ENDPOINT_HEALTH, get(handle_health))
        .nest(
            ENDPOINT_PRODUCTS,
            collection_router(stores.products, request_timeout),
        )
        .nest(
            ENDPOINT_LOCATIONS,
            collection_router(stores.locations, request_timeout),
        )
        .nest(
            ENDPOINT_INVENTORY,
            collection_router(stores.inventory, request_timeout),
        )
}

/// CRUD, list and batch routes for one entity kind.
pub fn collection_router<T: Document>(store: DocumentStore<T>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(handle_list::<T>).post(handle_create::<T>))
        .route(
            "/batch",
            post(handle_batch_create::<T>)
                .patch(handle_batch_update::<T>)
                .delete(handle_batch_delete::<T>),
        )
        .route("/batch/patch", post(handle_batch_patch::<T>))
        .route(
            "/:id",
            get(handle_get::<T>)
                .patch(handle_update::<T>)
                .delete(handle_delete::<T>),
        )
        .layer(Extension(Arc::new(CollectionState {
            store,
            request_timeout,
        })))
}
