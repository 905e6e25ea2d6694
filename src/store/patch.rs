//! Field-level patch operations over raw JSON documents.
//!
//! Paths are JSON-pointer style (`/price`, `/address/city`). Only object members
//! are addressable; array indices are not supported.

use super::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Sets the member, creating it (and missing parents) if needed.
    Set { path: String, value: Value },
    /// Removes the member; missing members are an error.
    Remove { path: String },
    /// Adds a number to an existing numeric member.
    Incr { path: String, value: Value },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Set { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Incr { path, .. } => path,
        }
    }

    fn segments(&self) -> Result<Vec<&str>> {
        let path = self.path();
        let Some(rest) = path.strip_prefix('/') else {
            return Err(StoreError::Validation(format!(
                "patch path '{path}' must start with '/'"
            )));
        };
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::Validation(format!(
                "patch path '{path}' has an empty segment"
            )));
        }
        Ok(segments)
    }

    /// Top-level member this operation writes to.
    pub fn root_field(&self) -> Option<&str> {
        self.path().strip_prefix('/')?.split('/').next()
    }
}

/// Rejects operations that would touch any of the `protected` top-level fields.
pub fn ensure_not_protected(operations: &[PatchOperation], protected: &[&str]) -> Result<()> {
    for op in operations {
        if let Some(field) = op.root_field()
            && (protected.contains(&field) || field.starts_with('_'))
        {
            return Err(StoreError::Validation(format!(
                "field '{field}' cannot be patched"
            )));
        }
    }
    Ok(())
}

/// Applies operations in order to `document`. On error the document may be
/// partially modified; callers work on a copy.
pub fn apply(document: &mut Value, operations: &[PatchOperation]) -> Result<()> {
    if operations.is_empty() {
        return Err(StoreError::Validation("no patch operations given".into()));
    }
    for op in operations {
        let segments = op.segments()?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| StoreError::Validation("empty patch path".into()))?;

        let parent = walk(document, parents, matches!(op, PatchOperation::Set { .. }))
            .ok_or_else(|| StoreError::Validation(format!("path '{}' not found", op.path())))?;

        match op {
            PatchOperation::Set { value, .. } => {
                parent.insert(last.to_string(), value.clone());
            }
            PatchOperation::Remove { path } => {
                if parent.remove(*last).is_none() {
                    return Err(StoreError::Validation(format!("path '{path}' not found")));
                }
            }
            PatchOperation::Incr { path, value } => {
                let current = parent
                    .get(*last)
                    .ok_or_else(|| StoreError::Validation(format!("path '{path}' not found")))?;
                let sum = add_numbers(current, value).ok_or_else(|| {
                    StoreError::Validation(format!("path '{path}' is not numeric"))
                })?;
                parent.insert(last.to_string(), sum);
            }
        }
    }
    Ok(())
}

fn walk<'a>(
    document: &'a mut Value,
    segments: &[&str],
    create: bool,
) -> Option<&'a mut Map<String, Value>> {
    let mut current = document.as_object_mut()?;
    for segment in segments {
        if create && !current.contains_key(*segment) {
            current.insert(segment.to_string(), Value::Object(Map::new()));
        }
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    Some(current)
}

fn add_numbers(current: &Value, delta: &Value) -> Option<Value> {
    if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64()) {
        return a.checked_add(b).map(Value::from);
    }
    let sum = current.as_f64()? + delta.as_f64()?;
    serde_json::Number::from_f64(sum).map(Value::Number)
}
