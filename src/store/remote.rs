//! Network backend for a remote store node.
//!
//! Reads (`read`, `query`) are idempotent and retried on transport-level
//! failures with exponential backoff and jitter. Writes are sent exactly once:
//! after a lost response there is no way to tell whether the write committed.

use super::backend::{BackendResult, DocumentBackend};
use super::error::BackendError;
use super::protocol::*;
use super::types::{ContinuationToken, DocumentKey, ETag, PartitionKey, RawDocument, RawPage};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;

const INITIAL_BACKOFF_MS: u64 = 150;
const MAX_BACKOFF_MS: u64 = 1200;

pub struct HttpBackend {
    base_url: Url,
    http_client: reqwest::Client,
    timeout: Duration,
    read_attempts: usize,
}

impl HttpBackend {
    pub fn new(endpoint: &str, timeout: Duration, read_attempts: usize) -> BackendResult<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| BackendError::Transport(format!("invalid store endpoint '{endpoint}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "invalid store endpoint '{endpoint}'"
            )));
        }
        Ok(Self {
            base_url,
            http_client: reqwest::Client::new(),
            timeout,
            read_attempts: read_attempts.max(1),
        })
    }

    fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport("store endpoint cannot take a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_url(&self, collection: &str, key: &DocumentKey) -> BackendResult<Url> {
        self.url(&[
            ENDPOINT_COLLECTIONS,
            collection,
            SEGMENT_DOCS,
            key.partition_key.as_str(),
            &key.id,
        ])
    }

    fn with_if_match(request: RequestBuilder, if_match: Option<&ETag>) -> RequestBuilder {
        match if_match {
            Some(etag) => request.header(HEADER_IF_MATCH, etag.as_str()),
            None => request,
        }
    }

    /// Sends an idempotent request, retrying transport failures only.
    async fn send_with_retry<F>(&self, build: F) -> BackendResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut delay_ms = INITIAL_BACKOFF_MS;

        for attempt in 0..self.read_attempts {
            match self.send_once(build()).await {
                Ok(response) => return Ok(response),
                Err(e @ (BackendError::Transport(_) | BackendError::TimedOut)) => {
                    if attempt + 1 == self.read_attempts {
                        return Err(e);
                    }
                    tracing::debug!("Store read attempt {} failed: {}", attempt + 1, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(e) => return Err(e),
            }
        }

        Err(BackendError::Transport("retry attempts exhausted".into()))
    }

    async fn send_once(&self, request: RequestBuilder) -> BackendResult<Response> {
        request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::TimedOut
            } else {
                BackendError::Transport(e.to_string())
            }
        })
    }

    /// Turns a non-success response into a status error carrying the node's message.
    async fn status_error(response: Response) -> BackendError {
        let code = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => format!("store node answered {}", code),
        };
        BackendError::status(code, message)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> BackendResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn expect_document(response: Response, expected: StatusCode) -> BackendResult<RawDocument> {
        if response.status() != expected {
            return Err(Self::status_error(response).await);
        }
        let doc: DocumentResponse = Self::decode(response).await?;
        Ok(doc.into())
    }
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn read(&self, collection: &str, key: &DocumentKey) -> BackendResult<RawDocument> {
        let url = self.document_url(collection, key)?;
        let response = self
            .send_with_retry(|| self.http_client.get(url.clone()))
            .await?;
        Self::expect_document(response, StatusCode::OK).await
    }

    async fn create(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
    ) -> BackendResult<RawDocument> {
        let url = self.url(&[ENDPOINT_COLLECTIONS, collection, SEGMENT_DOCS])?;
        let payload = CreateDocumentRequest {
            partition_key: key.partition_key.clone(),
            id: key.id.clone(),
            body,
        };
        let response = self
            .send_once(self.http_client.post(url).json(&payload))
            .await?;
        Self::expect_document(response, StatusCode::CREATED).await
    }

    async fn replace(
        &self,
        collection: &str,
        key: &DocumentKey,
        body: serde_json::Value,
        if_match: Option<&ETag>,
    ) -> BackendResult<RawDocument> {
        let url = self.document_url(collection, key)?;
        let request = Self::with_if_match(self.http_client.put(url).json(&body), if_match);
        let response = self.send_once(request).await?;
        Self::expect_document(response, StatusCode::OK).await
    }

    async fn delete(
        &self,
        collection: &str,
        key: &DocumentKey,
        if_match: Option<&ETag>,
    ) -> BackendResult<()> {
        let url = self.document_url(collection, key)?;
        let request = Self::with_if_match(self.http_client.delete(url), if_match);
        let response = self.send_once(request).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        partition: Option<&PartitionKey>,
        continuation: Option<&ContinuationToken>,
        max_items: usize,
    ) -> BackendResult<RawPage> {
        let url = self.url(&[ENDPOINT_COLLECTIONS, collection, SEGMENT_QUERY])?;
        let payload = QueryRequest {
            partition_key: partition.cloned(),
            continuation: continuation.cloned(),
            max_items,
        };
        let response = self
            .send_with_retry(|| self.http_client.post(url.clone()).json(&payload))
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let page: QueryResponse = Self::decode(response).await?;
        Ok(RawPage {
            documents: page.documents.into_iter().map(RawDocument::from).collect(),
            continuation: page.continuation,
        })
    }
}
