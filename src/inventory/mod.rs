//! Inventory Domain Module
//!
//! The three entity kinds of the inventory system and how each one is placed
//! in the partitioned store.
//!
//! | Entity          | Collection  | Partition key | Identifier                   |
//! |-----------------|-------------|---------------|------------------------------|
//! | `Product`       | products    | `category`    | generated UUID v4            |
//! | `Location`      | locations   | `id`          | generated UUID v4            |
//! | `InventoryItem` | inventory   | `locationId`  | `"{productId}:{locationId}"` |
//!
//! Deleting a product leaves its inventory items in place; removing them is up
//! to the caller.

pub mod stores;
pub mod types;

pub use stores::InventoryStores;
pub use types::{
    InventoryItem, InventoryItemPatch, Location, LocationPatch, Product, ProductPatch,
    ProductStatus,
};
