//! REST publishing tests
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use beacon_core::AppSchema;
use integration_tests::*;
use serde_json::json;

async fn server() -> TestServer {
    TestServer::start(test_config(vec![test_app()]))
        .await
        .expect("Failed to start server")
}

#[tokio::test]
async fn test_health_check() {
    let server = server().await;
    let response = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_publish_reaches_subscribers() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();
    client.subscribe(json!({"channel": "news"})).await.unwrap();

    let (status, body) = server
        .publish(APP_ID, &json!({"name": "headline", "channel": "news", "data": "{\"id\":1}"}))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, json!({}));

    let frame = client.expect("headline").await.unwrap();
    assert_eq!(frame["channel"], "news");
    assert_eq!(frame["data"], "{\"id\":1}");
}

#[tokio::test]
async fn test_publish_excludes_socket_id() {
    let server = server().await;
    let mut origin = server.connect().await.unwrap();
    let mut other = server.connect().await.unwrap();
    origin.subscribe(json!({"channel": "news"})).await.unwrap();
    other.subscribe(json!({"channel": "news"})).await.unwrap();

    let (status, _) = server
        .publish(
            APP_ID,
            &json!({
                "name": "headline",
                "channels": ["news"],
                "data": "{}",
                "socket_id": origin.socket_id,
            }),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);

    other.expect("headline").await.unwrap();
    origin
        .expect_silence(Duration::from_millis(200))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_batch_publish() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();
    client.subscribe(json!({"channel": "a"})).await.unwrap();
    client.subscribe(json!({"channel": "b"})).await.unwrap();

    let (status, _) = server
        .post_signed(
            APP_ID,
            "batch_events",
            &json!({"batch": [
                {"name": "first", "channel": "a", "data": "1"},
                {"name": "second", "channel": "b", "data": "2"},
            ]}),
            true,
        )
        .await
        .unwrap();
    assert_eq!(status, 200);

    assert_eq!(client.next_frame().await.unwrap()["event"], "first");
    assert_eq!(client.next_frame().await.unwrap()["event"], "second");
}

#[tokio::test]
async fn test_bad_signature_is_unauthorized() {
    let server = server().await;
    let (status, body) = server
        .post_signed(
            APP_ID,
            "events",
            &json!({"name": "x", "channel": "news", "data": "{}"}),
            false,
        )
        .await
        .unwrap();
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_unknown_app_is_not_found() {
    let server = server().await;
    let (status, _) = server
        .publish("missing", &json!({"name": "x", "channel": "news", "data": "{}"}))
        .await
        .unwrap();
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_payload_too_large() {
    let app = AppSchema {
        max_event_payload_in_kb: Some(1.0),
        ..test_app()
    };
    let server = TestServer::start(test_config(vec![app])).await.unwrap();
    let (status, _) = server
        .publish(APP_ID, &json!({"name": "x", "channel": "news", "data": "y".repeat(2048)}))
        .await
        .unwrap();
    assert_eq!(status, 413);
}

#[tokio::test]
async fn test_backend_rate_limit() {
    let app = AppSchema {
        max_backend_events_per_second: Some(1),
        ..test_app()
    };
    let server = TestServer::start(test_config(vec![app])).await.unwrap();
    let body = json!({"name": "x", "channel": "news", "data": "{}"});

    let (first, _) = server.publish(APP_ID, &body).await.unwrap();
    let (second, _) = server.publish(APP_ID, &body).await.unwrap();
    assert_eq!(first, 200);
    assert_eq!(second, 429);
}
