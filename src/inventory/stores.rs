use super::types::{InventoryItem, Location, Product};
use crate::config::StoreSettings;
use crate::store::{DocumentBackend, DocumentStore, StoreLimits};
use std::sync::Arc;

/// One typed store per entity kind, all sharing a single backend handle.
#[derive(Clone)]
pub struct InventoryStores {
    pub products: DocumentStore<Product>,
    pub locations: DocumentStore<Location>,
    pub inventory: DocumentStore<InventoryItem>,
}

impl InventoryStores {
    /// Stores under the default collection names.
    pub fn new(backend: Arc<dyn DocumentBackend>, limits: StoreLimits) -> Self {
        Self {
            products: DocumentStore::new(backend.clone()).with_limits(limits),
            locations: DocumentStore::new(backend.clone()).with_limits(limits),
            inventory: DocumentStore::new(backend).with_limits(limits),
        }
    }

    /// Stores named after the configured database and containers.
    pub fn from_settings(backend: Arc<dyn DocumentBackend>, settings: &StoreSettings) -> Self {
        let containers = &settings.containers;
        let stores = Self::new(backend, settings.limits());
        Self {
            products: stores
                .products
                .with_collection(settings.collection(&containers.products)),
            locations: stores
                .locations
                .with_collection(settings.collection(&containers.locations)),
            inventory: stores
                .inventory
                .with_collection(settings.collection(&containers.inventory)),
        }
    }
}
