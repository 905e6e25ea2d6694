//! Inventory HTTP API
//!
//! A thin routing layer: each handler parses the request, calls one store
//! operation and maps its outcome to a status code.
//!
//! ## Status Mapping
//! - `NotFound` → 404, `Conflict` → 409, `PreconditionFailed` → 412
//! - `ValidationError` → 400, `Timeout` → 504, `Unavailable` → 503, `Unknown` → 500
//! - Batches answer 200 when every item succeeded and 207 otherwise, with per-item results.

pub mod handlers;
pub mod protocol;
pub mod routes;

pub use routes::router;

#[cfg(test)]
mod tests;
