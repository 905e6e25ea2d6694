//! In-process partitioned document store.
//!
//! Layout: `collection -> partition key -> (id -> document)`. Each partition is
//! an ordered map so queries can resume from a position; the outer maps are
//! `DashMap`s so unrelated partitions never contend. All check-and-write steps
//! for a document happen while holding its partition entry, which makes the
//! `if_match` comparison and the write a single atomic step.

use super::backend::{BackendResult, DocumentBackend};
use super::error::BackendError;
use super::types::{ContinuationToken, DocumentKey, ETag, PartitionKey, RawDocument, RawPage};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

type Partition = BTreeMap<String, RawDocument>;

#[derive(Default)]
pub struct MemoryBackend {
    collections: DashMap<String, DashMap<PartitionKey, Partition>>,
}

/// Resume position encoded inside continuation tokens.
#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    partition: String,
    after: String,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|partitions| partitions.iter().map(|p| p.value().len()).sum())
            .unwrap_or(0)
    }

    pub fn partition_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|partitions| partitions.len())
            .unwrap_or(0)
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    fn check_body(key: &DocumentKey, body: &serde_json::Value) -> BackendResult<()> {
        let Some(object) = body.as_object() else {
            return Err(BackendError::bad_request("document body must be a JSON object"));
        };
        match object.get("id").and_then(|id| id.as_str()) {
            Some(id) if id == key.id => Ok(()),
            Some(id) => Err(BackendError::bad_request(format!(
                "body id '{}' does not match key id '{}'",
                id, key.id
            ))),
            None => Err(BackendError::bad_request("document body has no id")),
        }
    }

    fn check_if_match(current: &RawDocument, if_match: Option<&ETag>, key: &DocumentKey) -> BackendResult<()> {
        match if_match {
            Some(expected) if expected != &current.etag => Err(BackendError::precondition_failed(
                format!("etag mismatch for {}", key),
            )),
            _ => Ok(()),
        }
    }

    fn encode_cursor(cursor: &Cursor) -> BackendResult<ContinuationToken> {
        let json = serde_json::to_vec(cursor).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(ContinuationToken::from_opaque(URL_SAFE_NO_PAD.encode(json)))
    }

    fn decode_cursor(token: &ContinuationToken) -> BackendResult<Cursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.opaque())
            .map_err(|_| BackendError::bad_request("invalid continuation token"))?;
        serde_json::from_slice(&bytes).map_err(|_| BackendError::bad_request("invalid continuation token"))
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn read(&self, collection: &str, key: &DocumentKey) -> BackendResult<RawDocument> {
        self.collections
            .get(collection)
            .and_then(|partitions| {
                partitions
                    .get(&key.partition_key)
                    .and_then(|partition| partition.get(&key.id).cloned())
            })
            .ok_or_else(|| BackendError::not_found(format!("{} not found", key)))
    }

    async fn create(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
    ) -> BackendResult<RawDocument> {
        Self::check_body(key, &body)?;

        let partitions = self
            .collections
            .entry(collection.to_string())
            .or_default()
            .downgrade();
        let mut partition = partitions.entry(key.partition_key.clone()).or_default();

        if partition.contains_key(&key.id) {
            return Err(BackendError::conflict(format!("{} already exists", key)));
        }

        let document = RawDocument {
            body,
            etag: ETag::generate(),
            timestamp: now_secs(),
        };
        partition.insert(key.id.clone(), document.clone());
        tracing::debug!("Created {} in {}", key, collection);
        Ok(document)
    }

    async fn replace(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
        if_match: Option<&ETag>,
    ) -> BackendResult<RawDocument> {
        Self::check_body(key, &body)?;

        let not_found = || BackendError::not_found(format!("{} not found", key));
        let partitions = self.collections.get(collection).ok_or_else(not_found)?;
        let mut partition = partitions.get_mut(&key.partition_key).ok_or_else(not_found)?;
        let current = partition.get_mut(&key.id).ok_or_else(not_found)?;

        Self::check_if_match(current, if_match, key)?;

        current.body = body;
        current.etag = ETag::generate();
        current.timestamp = now_secs().max(current.timestamp);
        tracing::debug!("Replaced {} in {}", key, collection);
        Ok(current.clone())
    }

    async fn delete(
        &self,
        collection: &str,
        key: &DocumentKey,
        if_match: Option<&ETag>,
    ) -> BackendResult<()> {
        let not_found = || BackendError::not_found(format!("{} not found", key));
        let partitions = self.collections.get(collection).ok_or_else(not_found)?;
        let mut partition = partitions.get_mut(&key.partition_key).ok_or_else(not_found)?;
        let current = partition.get(&key.id).ok_or_else(not_found)?;

        Self::check_if_match(current, if_match, key)?;

        partition.remove(&key.id);
        let emptied = partition.is_empty();
        drop(partition);
        if emptied {
            // A create may have refilled it since the guard was released.
            partitions.remove_if(&key.partition_key, |_, docs| docs.is_empty());
        }
        tracing::debug!("Deleted {} from {}", key, collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        partition: Option<&PartitionKey>,
        continuation: Option<&ContinuationToken>,
        max_items: usize,
    ) -> BackendResult<RawPage> {
        if max_items == 0 {
            return Err(BackendError::bad_request("max_items must be at least 1"));
        }

        let cursor = continuation.map(Self::decode_cursor).transpose()?;
        if let (Some(cursor), Some(scope)) = (&cursor, partition)
            && cursor.partition != scope.as_str()
        {
            return Err(BackendError::bad_request(
                "continuation token belongs to another partition",
            ));
        }

        let Some(partitions) = self.collections.get(collection) else {
            return Ok(RawPage {
                documents: Vec::new(),
                continuation: None,
            });
        };

        let mut scope: Vec<PartitionKey> = match partition {
            Some(pk) => vec![pk.clone()],
            None => partitions.iter().map(|p| p.key().clone()).collect(),
        };
        scope.sort();

        // One extra item tells us whether another page exists.
        let mut collected: Vec<(PartitionKey, String, RawDocument)> = Vec::with_capacity(max_items + 1);
        for pk in scope {
            if let Some(cursor) = &cursor
                && pk.as_str() < cursor.partition.as_str()
            {
                continue;
            }
            let Some(docs) = partitions.get(&pk) else {
                continue;
            };
            let lower = match &cursor {
                Some(cursor) if cursor.partition == pk.as_str() => {
                    Bound::Excluded(cursor.after.clone())
                }
                _ => Bound::Unbounded,
            };
            for (id, doc) in docs.range((lower, Bound::Unbounded)) {
                collected.push((pk.clone(), id.clone(), doc.clone()));
                if collected.len() > max_items {
                    break;
                }
            }
            if collected.len() > max_items {
                break;
            }
        }

        let continuation = if collected.len() > max_items {
            collected.truncate(max_items);
            let (pk, id, _) = &collected[max_items - 1];
            Some(Self::encode_cursor(&Cursor {
                partition: pk.as_str().to_string(),
                after: id.clone(),
            })?)
        } else {
            None
        };

        Ok(RawPage {
            documents: collected.into_iter().map(|(_, _, doc)| doc).collect(),
            continuation,
        })
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
