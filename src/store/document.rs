use super::error::Result;
use super::types::PartitionKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// An entity kind that lives in its own partitioned collection.
///
/// Implementors describe how the entity is addressed (identifier, partition key)
/// and what a valid instance looks like. The client uses this to enforce the
/// partition and concurrency rules uniformly across entity kinds.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Partial-update shape; absent fields are left untouched.
    type Patch: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Default collection (container) name.
    const COLLECTION: &'static str;

    /// JSON field holding the partition key, e.g. `category`.
    const PARTITION_KEY_FIELD: &'static str;

    fn id(&self) -> Option<&str>;

    /// Assigns the identifier before the first write: generated when absent,
    /// derived for entities whose identity is composite.
    fn assign_id(&mut self) -> Result<()>;

    fn partition_key(&self) -> Result<PartitionKey>;

    fn validate(&self) -> Result<()>;

    fn apply_patch(&mut self, patch: Self::Patch) -> Result<()>;

    /// True when `patch` names no field at all. Fields serialized as `null`
    /// count as absent.
    fn patch_is_empty(patch: &Self::Patch) -> bool {
        match serde_json::to_value(patch) {
            Ok(serde_json::Value::Object(fields)) => fields.values().all(|v| v.is_null()),
            _ => false,
        }
    }

    /// Records the creation time, replacing whatever the caller supplied.
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.touch(now);
    }

    /// Records a mutation time. Implementors keep the later of `now` and the
    /// time already recorded, so the timestamp never moves backwards.
    fn touch(&mut self, _now: DateTime<Utc>) {}

    /// Fields that no patch may write: the identifier and the partition key.
    fn immutable_fields() -> [&'static str; 2] {
        ["id", Self::PARTITION_KEY_FIELD]
    }
}
