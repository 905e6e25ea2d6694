//! Inventory API Library
//!
//! This library crate defines the core modules of the inventory service.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled parts:
//!
//! - **`store`**: The partitioned document store client. Addresses documents by
//!   id + partition key, enforces optimistic concurrency with ETags, pages with
//!   opaque continuation tokens and runs partially-failing batches. Ships an
//!   in-memory backend, an HTTP backend and the store node that serves it.
//! - **`inventory`**: The domain entities (products, locations, inventory items)
//!   and the typed stores built for them.
//! - **`api`**: The HTTP routing layer mapping requests onto store operations.
//! - **`config`** / **`logging`**: Layered settings and tracing setup for the binary.

pub mod api;
pub mod config;
pub mod inventory;
pub mod logging;
pub mod store;
