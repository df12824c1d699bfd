use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use storefront_api::app::services::{build_in_memory_services, AppServices};
use storefront_auth::JwtClaims;
use storefront_catalog::ProductRecord;
use storefront_core::{CartItemId, ProductId, UserId};
use storefront_infra::catalog::InMemoryCatalog;

struct TestServer {
    base_url: String,
    catalog: Arc<InMemoryCatalog>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build the prod router over the in-memory stack, but keep the
        // catalog handle so tests can seed products.
        let services = Arc::new(build_in_memory_services());
        let catalog = match services.as_ref() {
            AppServices::InMemory { catalog, .. } => Arc::clone(catalog),
            #[cfg(feature = "redis")]
            AppServices::Persistent { .. } => unreachable!("in-memory stack expected in tests"),
        };

        let app =
            storefront_api::app::build_app_with_services(jwt_secret.to_string(), services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            catalog,
            handle,
        }
    }

    fn seed_product(&self, price: u64, stock: u32) -> ProductId {
        let id = ProductId::new();
        self.catalog.upsert(ProductRecord {
            id,
            price,
            stock_quantity: stock,
            active: true,
        });
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user_id: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn add_item(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    product_id: ProductId,
    quantity: u32,
) -> (StatusCode, serde_json::Value) {
    let res = client
        .post(format!("{}/cart/items", base_url))
        .bearer_auth(token)
        .json(&json!({ "product_id": product_id.to_string(), "quantity": quantity }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body: serde_json::Value = res.json().await.unwrap();
    (status, body)
}

async fn get_cart_eventually<F>(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    mut ready: F,
) -> serde_json::Value
where
    F: FnMut(&serde_json::Value) -> bool,
{
    // Cache invalidation runs behind the commit (publish -> worker), so a
    // read right after a mutation can briefly see the previous snapshot.
    // Poll until the read catches up.
    for _ in 0..50 {
        let res = client
            .get(format!("{}/cart", base_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("cart read did not reflect the mutation within timeout");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Liveness stays public.
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn whoami_echoes_the_token_subject() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let user_id = UserId::new();
    let token = mint_jwt(jwt_secret, user_id);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
}

#[tokio::test]
async fn add_update_remove_flow_returns_post_commit_snapshots() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let product = srv.seed_product(1500, 10);

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    // First add creates the line.
    let (status, body) = add_item(&client, &srv.base_url, &token, product, 2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 2);
    assert_eq!(body["items"][0]["subtotal"], 3000);
    assert_eq!(body["total_amount"], 3000);
    assert_eq!(body["item_count"], 2);

    // Second add merges into the same line.
    let (status, body) = add_item(&client, &srv.base_url, &token, product, 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 3);
    let item_id = body["items"][0]["id"].as_str().unwrap().to_string();

    // Absolute update recalculates totals.
    let res = client
        .put(format!("{}/cart/items/{}", srv.base_url, item_id))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"][0]["quantity"], 5);
    assert_eq!(body["total_amount"], 7500);

    // Removal empties the cart.
    let res = client
        .delete(format!("{}/cart/items/{}", srv.base_url, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["total_amount"], 0);
}

#[tokio::test]
async fn update_to_zero_removes_and_clear_empties() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let first = srv.seed_product(500, 10);
    let second = srv.seed_product(900, 10);

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let (_, body) = add_item(&client, &srv.base_url, &token, first, 2).await;
    let first_line = body["items"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = add_item(&client, &srv.base_url, &token, second, 3).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    // Quantity zero is removal.
    let res = client
        .put(format!("{}/cart/items/{}", srv.base_url, first_line))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["items"][0]["product_id"].as_str().unwrap(),
        second.to_string()
    );

    // Clear drops the rest.
    let res = client
        .delete(format!("{}/cart", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn reads_reflect_mutations_after_invalidation() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let product = srv.seed_product(1200, 10);

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    // Prime the cache with the empty cart.
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, _) = add_item(&client, &srv.base_url, &token, product, 2).await;
    assert_eq!(status, StatusCode::OK);

    let body = get_cart_eventually(&client, &srv.base_url, &token, |body| {
        body["items"].as_array().is_some_and(|items| !items.is_empty())
    })
    .await;
    assert_eq!(body["items"][0]["quantity"], 2);
    assert_eq!(body["total_amount"], 2400);
}

#[tokio::test]
async fn error_codes_follow_the_shared_shape() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let product = srv.seed_product(500, 4);
    let inactive = ProductId::new();
    srv.catalog.upsert(ProductRecord {
        id: inactive,
        price: 300,
        stock_quantity: 10,
        active: false,
    });

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    // Zero quantity.
    let (status, body) = add_item(&client, &srv.base_url, &token, product, 0).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_quantity");

    // Over the per-line cap.
    let (status, body) = add_item(&client, &srv.base_url, &token, product, 11).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_quantity");

    // More than the available stock.
    let (status, body) = add_item(&client, &srv.base_url, &token, product, 6).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_stock");

    // Unknown product.
    let (status, body) = add_item(&client, &srv.base_url, &token, ProductId::new(), 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // Inactive product behaves like a missing one.
    let (status, body) = add_item(&client, &srv.base_url, &token, inactive, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // Malformed product id.
    let res = client
        .post(format!("{}/cart/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "product_id": "not-a-uuid", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Updating a line that does not exist.
    let res = client
        .put(format!("{}/cart/items/{}", srv.base_url, CartItemId::new()))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn merge_reports_merged_and_skipped_counts() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let landing = srv.seed_product(500, 10);
    let inactive = ProductId::new();
    srv.catalog.upsert(ProductRecord {
        id: inactive,
        price: 300,
        stock_quantity: 10,
        active: false,
    });
    let unknown = ProductId::new();

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/cart/merge", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "items": [
                { "product_id": landing.to_string(), "quantity": 3 },
                { "product_id": inactive.to_string(), "quantity": 2 },
                { "product_id": unknown.to_string(), "quantity": 1 },
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["merged"], 1);
    assert_eq!(body["skipped"], 2);
    assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["cart"]["items"][0]["quantity"], 3);
    assert_eq!(
        body["cart"]["items"][0]["product_id"].as_str().unwrap(),
        landing.to_string()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_converge_without_lost_updates() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let product = srv.seed_product(500, 10);

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let url = format!("{}/cart/items", srv.base_url);
        let token = token.clone();
        let payload = json!({ "product_id": product.to_string(), "quantity": 1 });
        handles.push(tokio::spawn(async move {
            // 409 is the documented retryable outcome; retry like a client.
            for _ in 0..10 {
                let res = client
                    .post(url.as_str())
                    .bearer_auth(&token)
                    .json(&payload)
                    .send()
                    .await
                    .unwrap();
                match res.status() {
                    StatusCode::OK => return,
                    StatusCode::CONFLICT => {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    }
                    other => panic!("unexpected status {other}"),
                }
            }
            panic!("add did not land after retries");
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 4);
    assert_eq!(body["item_count"], 4);
}

#[tokio::test]
async fn deleted_product_disappears_from_the_cart_and_stays_gone() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let keep = srv.seed_product(500, 10);
    let vanishing = srv.seed_product(900, 10);

    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    add_item(&client, &srv.base_url, &token, keep, 1).await;
    let (status, body) = add_item(&client, &srv.base_url, &token, vanishing, 2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    srv.catalog.remove(vanishing);

    // First read prunes the dead line and commits the cleanup.
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["items"][0]["product_id"].as_str().unwrap(),
        keep.to_string()
    );

    // The pruning is durable, not a display-time filter.
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["items"][0]["product_id"].as_str().unwrap(),
        keep.to_string()
    );
}
