//! API Module Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.
//!
//! ## Test Scopes
//! - **Routing**: partition-key parameters, location ids as partition keys, composite inventory ids.
//! - **Concurrency tags**: `_etag` in update bodies and `If-Match` on deletes.
//! - **Status mapping**: every error kind leaves with its own status code.
//! - **Batches**: 200 vs 207 and per-item results.

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::inventory::InventoryStores;
    use crate::store::backend::{BackendResult, DocumentBackend};
    use crate::store::types::{RawDocument, RawPage};
    use crate::store::{
        BackendError, ContinuationToken, DocumentKey, ETag, MemoryBackend, PartitionKey,
        StoreLimits,
    };
    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(backend: Arc<dyn DocumentBackend>, timeout: Duration) -> Router {
        router(InventoryStores::new(backend, StoreLimits::default()), timeout)
    }

    fn app() -> Router {
        app_with(Arc::new(MemoryBackend::new()), Duration::from_secs(5))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn mouse() -> Value {
        json!({
            "name": "Mouse",
            "category": "electronics",
            "price": 24.99,
            "sku": "M-1"
        })
    }

    /// Never answers.
    struct StalledBackend;

    #[async_trait]
    impl DocumentBackend for StalledBackend {
        async fn read(&self, _: &str, _: &DocumentKey) -> BackendResult<RawDocument> {
            std::future::pending().await
        }

        async fn create(&self, _: &str, _: &DocumentKey, _: Value) -> BackendResult<RawDocument> {
            std::future::pending().await
        }

        async fn replace(
            &self,
            _: &str,
            _: &DocumentKey,
            _: Value,
            _: Option<&ETag>,
        ) -> BackendResult<RawDocument> {
            std::future::pending().await
        }

        async fn delete(&self, _: &str, _: &DocumentKey, _: Option<&ETag>) -> BackendResult<()> {
            std::future::pending().await
        }

        async fn query(
            &self,
            _: &str,
            _: Option<&PartitionKey>,
            _: Option<&ContinuationToken>,
            _: usize,
        ) -> BackendResult<RawPage> {
            std::future::pending().await
        }
    }

    /// Answers every call with the same raw error.
    struct BrokenBackend(BackendError);

    #[async_trait]
    impl DocumentBackend for BrokenBackend {
        async fn read(&self, _: &str, _: &DocumentKey) -> BackendResult<RawDocument> {
            Err(self.0.clone())
        }

        async fn create(&self, _: &str, _: &DocumentKey, _: Value) -> BackendResult<RawDocument> {
            Err(self.0.clone())
        }

        async fn replace(
            &self,
            _: &str,
            _: &DocumentKey,
            _: Value,
            _: Option<&ETag>,
        ) -> BackendResult<RawDocument> {
            Err(self.0.clone())
        }

        async fn delete(&self, _: &str, _: &DocumentKey, _: Option<&ETag>) -> BackendResult<()> {
            Err(self.0.clone())
        }

        async fn query(
            &self,
            _: &str,
            _: Option<&PartitionKey>,
            _: Option<&ContinuationToken>,
            _: usize,
        ) -> BackendResult<RawPage> {
            Err(self.0.clone())
        }
    }

    // ============================================================
    // PRODUCT ROUTES
    // ============================================================

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_mouse_price_update_over_http() {
        // ARRANGE
        let app = app();

        // ACT
        let (status, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        let t1 = created["_etag"].as_str().unwrap().to_string();
        let uri = format!("/products/{}?category=electronics", id);

        let (status, updated) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "_etag": t1, "price": 19.99 })),
            &[],
        )
        .await;
        let (retry_status, retry) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "_etag": t1, "price": 19.99 })),
            &[],
        )
        .await;

        // ASSERT
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"].as_f64(), Some(19.99));
        assert_ne!(updated["_etag"], created["_etag"]);
        assert_eq!(updated["status"], "active");
        assert_eq!(retry_status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(retry["kind"], "precondition_failed");
    }

    #[tokio::test]
    async fn test_get_without_partition_key_is_bad_request() {
        let app = app();
        let (_, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;

        let uri = format!("/products/{}", created["id"].as_str().unwrap());
        let (status, body) = send(&app, "GET", &uri, None, &[]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_missing_product_is_not_found() {
        let (status, body) = send(&app(), "GET", "/products/nope?category=electronics", None, &[]).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let app = app();
        let mut product = mouse();
        product["id"] = json!("mouse-1");

        send(&app, "POST", "/products", Some(product.clone()), &[]).await;
        let (status, _) = send(&app, "POST", "/products", Some(product), &[]).await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_bad_request() {
        let app = app();

        let mut negative = mouse();
        negative["price"] = json!(-5);
        let (status, _) = send(&app, "POST", "/products", Some(negative), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/products", Some(json!({ "name": "x" })), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;
        let uri = format!("/products/{}?category=electronics", created["id"].as_str().unwrap());
        let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "price": 1.0 })), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "Missing _etag");

        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "_etag": created["_etag"], "category": "toys" })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "Partition key cannot change");
    }

    #[tokio::test]
    async fn test_update_without_fields_keeps_version() {
        let app = app();
        let (_, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;
        let uri = format!("/products/{}?category=electronics", created["id"].as_str().unwrap());

        let (status, body) = send(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "_etag": created["_etag"] })),
            &[],
        )
        .await;
        let (_, current) = send(&app, "GET", &uri, None, &[]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");
        assert_eq!(current["_etag"], created["_etag"], "Tag is not reissued");
    }

    #[tokio::test]
    async fn test_delete_honours_if_match() {
        let app = app();
        let (_, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;
        let uri = format!("/products/{}?category=electronics", created["id"].as_str().unwrap());
        let etag = created["_etag"].as_str().unwrap();

        let (stale, _) = send(&app, "DELETE", &uri, None, &[("if-match", "\"stale\"")]).await;
        let (deleted, _) = send(&app, "DELETE", &uri, None, &[("if-match", etag)]).await;
        let (after, _) = send(&app, "GET", &uri, None, &[]).await;

        assert_eq!(stale, StatusCode::PRECONDITION_FAILED);
        assert_eq!(deleted, StatusCode::NO_CONTENT);
        assert_eq!(after, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let app = app();
        for i in 0..5 {
            let mut product = mouse();
            product["sku"] = json!(format!("M-{}", i));
            send(&app, "POST", "/products", Some(product), &[]).await;
        }

        let mut seen = 0;
        let mut uri = "/products?category=electronics&max_items=2".to_string();
        loop {
            let (status, page) = send(&app, "GET", &uri, None, &[]).await;
            assert_eq!(status, StatusCode::OK);
            let items = page["items"].as_array().unwrap();
            assert!(items.len() <= 2);
            seen += items.len();
            match page["continuation_token"].as_str() {
                Some(token) => {
                    uri = format!(
                        "/products?category=electronics&max_items=2&continuation_token={}",
                        token
                    )
                }
                None => break,
            }
        }

        assert_eq!(seen, 5);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_page_size() {
        let (status, _) = send(&app(), "GET", "/products?max_items=lots", None, &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app(), "GET", "/products?max_items=0", None, &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // LOCATION & INVENTORY ROUTES
    // ============================================================

    #[tokio::test]
    async fn test_location_id_is_partition_key() {
        let app = app();
        let (status, created) = send(
            &app,
            "POST",
            "/locations",
            Some(json!({ "name": "Downtown", "address": "1 Main St" })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/locations/{}", created["id"].as_str().unwrap());
        let (status, fetched) = send(&app, "GET", &uri, None, &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Downtown");
    }

    #[tokio::test]
    async fn test_inventory_item_composite_id() {
        let app = app();
        let (status, created) = send(
            &app,
            "POST",
            "/inventory",
            Some(json!({ "productId": "p-1", "locationId": "store-1", "quantity": 3 })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], "p-1:store-1");

        let (status, updated) = send(
            &app,
            "PATCH",
            "/inventory/p-1:store-1?locationId=store-1",
            Some(json!({ "_etag": created["_etag"], "quantity": 9 })),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["quantity"], 9);
    }

    // ============================================================
    // BATCH ROUTES
    // ============================================================

    #[tokio::test]
    async fn test_batch_update_reports_partial_failure() {
        // ARRANGE
        let app = app();
        let mut items = Vec::new();
        for i in 0..3 {
            let mut product = mouse();
            product["sku"] = json!(format!("M-{}", i));
            let (_, created) = send(&app, "POST", "/products", Some(product), &[]).await;
            items.push(json!({
                "id": created["id"],
                "partitionKey": "electronics",
                "_etag": created["_etag"],
                "changes": { "quantity": 10 }
            }));
        }
        items.push(json!({
            "id": "ghost",
            "partitionKey": "electronics",
            "_etag": "\"ghost\"",
            "changes": { "quantity": 1 }
        }));

        // ACT
        let (status, report) = send(&app, "PATCH", "/products/batch", Some(json!(items)), &[]).await;

        // ASSERT
        assert_eq!(status, StatusCode::MULTI_STATUS);
        let results = report["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r["status"] == "succeeded"));
        assert_eq!(results[3]["status"], "failed");
        assert_eq!(results[3]["kind"], "not_found");
        assert_eq!(results[0]["value"]["quantity"], 10);
    }

    #[tokio::test]
    async fn test_batch_create_and_delete_all_succeed() {
        let app = app();
        let products = json!([mouse(), mouse()]);

        let (status, report) = send(&app, "POST", "/products/batch", Some(products), &[]).await;
        assert_eq!(status, StatusCode::OK);

        let deletes: Vec<Value> = report["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| json!({ "id": r["value"]["id"], "partitionKey": "electronics" }))
            .collect();
        let (status, report) = send(&app, "DELETE", "/products/batch", Some(json!(deletes)), &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["results"][1]["value"]["partitionKey"], "electronics");
    }

    #[tokio::test]
    async fn test_batch_patch_rejects_partition_key_per_item() {
        let app = app();
        let (_, created) = send(&app, "POST", "/products", Some(mouse()), &[]).await;
        let ops = json!([{
            "id": created["id"],
            "partitionKey": "electronics",
            "_etag": created["_etag"],
            "operations": [{ "op": "set", "path": "/category", "value": "toys" }]
        }]);

        let (status, report) = send(&app, "POST", "/products/batch/patch", Some(ops), &[]).await;

        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(report["results"][0]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_oversized_batch_is_bad_request() {
        let batch: Vec<Value> = (0..101).map(|_| mouse()).collect();

        let (status, _) = send(&app(), "POST", "/products/batch", Some(json!(batch)), &[]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // STATUS MAPPING
    // ============================================================

    #[tokio::test]
    async fn test_request_deadline_maps_to_gateway_timeout() {
        let app = app_with(Arc::new(StalledBackend), Duration::from_millis(50));

        let (status, body) = send(&app, "GET", "/products/x?category=a", None, &[]).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["kind"], "timeout");
    }

    #[tokio::test]
    async fn test_backend_failures_map_to_server_errors() {
        let cases = [
            (BackendError::Transport("refused".into()), StatusCode::SERVICE_UNAVAILABLE),
            (BackendError::status(503, "draining"), StatusCode::SERVICE_UNAVAILABLE),
            (BackendError::status(500, "boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (raw, expected) in cases {
            let app = app_with(Arc::new(BrokenBackend(raw)), Duration::from_secs(1));
            let (status, _) = send(&app, "GET", "/locations/loc-1", None, &[]).await;
            assert_eq!(status, expected);
        }
    }
}
