use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use pastebox::clock::ManualClock;
use pastebox::config::{Config, RateLimitRule};
use pastebox::server::{build_state_with_clock, create_app};

fn test_app(config: Config) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let state = build_state_with_clock(&config, clock.clone()).unwrap();
    (create_app(state, &config), clock)
}

fn create_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/paste")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn single_file_paste() -> serde_json::Value {
    serde_json::json!({
        "files": [{ "name": "a.txt", "content": "hello" }]
    })
}

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let (app, _clock) = test_app(Config::default());

    let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;

    let id = created["id"].as_str().unwrap();
    assert_eq!(id.len(), 8);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

    let response = app
        .oneshot(get_request(&format!("/paste/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert_eq!(doc["files"][0]["name"], "a.txt");
    assert_eq!(doc["files"][0]["content"], "hello");
}

#[tokio::test]
async fn test_unknown_paste_is_not_found() {
    let (app, _clock) = test_app(Config::default());
    let response = app.oneshot(get_request("/paste/zzzzzzzz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_file_list_is_rejected() {
    let (app, _clock) = test_app(Config::default());
    let response = app
        .oneshot(create_request(serde_json::json!({ "files": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_rate_limit_denies_then_resets() {
    let mut config = Config::default();
    config.rate_limits.create = Some(RateLimitRule {
        requests: 2,
        window: Duration::from_secs(60),
    });
    let (app, clock) = test_app(config);

    for _ in 0..2 {
        let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    clock.advance_ms(60_000);
    let response = app.oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_rate_limit_headers_on_success() {
    let mut config = Config::default();
    config.rate_limits.create = Some(RateLimitRule {
        requests: 5,
        window: Duration::from_secs(60),
    });
    let (app, _clock) = test_app(config);

    let response = app.oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "5");
    assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "4");
    assert!(response.headers().contains_key("X-RateLimit-Reset"));
}

#[tokio::test]
async fn test_expired_paste_is_gone_without_explicit_delete() {
    let (app, clock) = test_app(Config::default());

    let mut body = single_file_paste();
    body["ttl_secs"] = serde_json::json!(30);
    let response = app.clone().oneshot(create_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app.clone().oneshot(get_request(&format!("/paste/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance_ms(31_000);
    let response = app.oneshot(get_request(&format!("/paste/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_ownership_and_idempotent_view() {
    let (app, _clock) = test_app(Config::default());

    let mut body = single_file_paste();
    body["owner_token"] = serde_json::json!("secret-owner");
    let response = app.clone().oneshot(create_request(body)).await.unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    // Wrong token: forbidden, and the paste survives.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/paste/{id}"))
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.clone().oneshot(get_request(&format!("/paste/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Matching token: removed.
    let delete = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/paste/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete("secret-owner")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(get_request(&format!("/paste/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting again looks like it never existed.
    let response = app.oneshot(delete("secret-owner")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_returns_only_own_pastes() {
    let (app, _clock) = test_app(Config::default());

    for token in ["alpha", "alpha", "beta"] {
        let mut body = single_file_paste();
        body["owner_token"] = serde_json::json!(token);
        let response = app.clone().oneshot(create_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/pastes")
                .header(header::AUTHORIZATION, "Bearer alpha")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // Listing without a token is a validation error.
    let response = app.oneshot(get_request("/pastes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stats_count_excludes_introspection() {
    let (app, _clock) = test_app(Config::default());

    // Three operation-surface calls: one create, two reads.
    let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_string();
    for _ in 0..2 {
        app.clone()
            .oneshot(get_request(&format!("/paste/{id}")))
            .await
            .unwrap();
    }

    let response = app.clone().oneshot(get_request("/admin/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["total_requests"], 3);

    // Stats and health calls leave the counter untouched.
    app.clone().oneshot(get_request("/health")).await.unwrap();
    let response = app.oneshot(get_request("/admin/stats")).await.unwrap();
    let stats = json_body(response).await;
    assert_eq!(stats["total_requests"], 3);
}

#[tokio::test]
async fn test_denied_requests_still_count_in_stats() {
    let mut config = Config::default();
    config.rate_limits.create = Some(RateLimitRule {
        requests: 1,
        window: Duration::from_secs(60),
    });
    let (app, _clock) = test_app(config);

    let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app.clone().oneshot(create_request(single_file_paste())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Both calls were handled, so both show up in the totals.
    let response = app.oneshot(get_request("/admin/stats")).await.unwrap();
    let stats = json_body(response).await;
    assert_eq!(stats["total_requests"], 2);
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let (app, _clock) = test_app(Config::default());
    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_claimed_paste_returns_fresh_owner_token() {
    let (app, _clock) = test_app(Config::default());

    let mut body = single_file_paste();
    body["claim"] = serde_json::json!(true);
    let response = app.clone().oneshot(create_request(body)).await.unwrap();
    let created = json_body(response).await;
    let token = created["owner_token"].as_str().unwrap().to_string();
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/pastes")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert_eq!(listed[0]["id"], id.as_str());
}
