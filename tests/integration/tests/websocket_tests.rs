//! WebSocket protocol tests against a live server
//!
//! Run with: cargo test -p integration-tests --test websocket_tests

use std::time::Duration;

use beacon_core::AppSchema;
use integration_tests::*;
use serde_json::json;

async fn server() -> TestServer {
    TestServer::start(test_config(vec![test_app()]))
        .await
        .expect("Failed to start server")
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_connection_established() {
    let server = server().await;
    let mut client = server.connect_raw(APP_KEY).await.unwrap();

    let frame = client.expect("pusher:connection_established").await.unwrap();
    let data = decode_data(&frame).unwrap();
    assert!(data["socket_id"].as_str().unwrap().contains('.'));
    assert_eq!(data["activity_timeout"], 30);
}

#[tokio::test]
async fn test_unknown_app_key_is_closed() {
    let server = server().await;
    let mut client = server.connect_raw("no-such-key").await.unwrap();

    let frame = client.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4009);
    assert_eq!(client.closed().await.unwrap(), Closed::Code(4009));
}

#[tokio::test]
async fn test_disabled_app_is_closed() {
    let app = AppSchema {
        enabled: Some(false),
        ..test_app()
    };
    let server = TestServer::start(test_config(vec![app])).await.unwrap();
    let mut client = server.connect_raw(APP_KEY).await.unwrap();

    let frame = client.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4003);
    assert_eq!(client.closed().await.unwrap(), Closed::Code(4003));
}

#[tokio::test]
async fn test_connection_quota() {
    let app = AppSchema {
        max_connections: Some(1),
        ..test_app()
    };
    let server = TestServer::start(test_config(vec![app])).await.unwrap();
    let _first = server.connect().await.unwrap();

    let mut second = server.connect_raw(APP_KEY).await.unwrap();
    let frame = second.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4100);
    assert_eq!(second.closed().await.unwrap(), Closed::Code(4100));
}

#[tokio::test]
async fn test_ping_pong() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();

    client.send_event("pusher:ping", None, json!({})).await.unwrap();
    let frame = client.next_frame().await.unwrap();
    assert_eq!(frame, json!({"event": "pusher:pong", "data": {}}));
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();

    client.send_json(&json!("just a string")).await.unwrap();
    client.send_event("pusher:unknown", None, json!({})).await.unwrap();

    client.send_event("pusher:ping", None, json!({})).await.unwrap();
    client.expect("pusher:pong").await.unwrap();
}

#[tokio::test]
async fn test_disconnect_releases_namespace() {
    let server = server().await;
    let client = server.connect().await.unwrap();
    assert_eq!(server.registry().connections_count(APP_ID), 1);

    client.close().await.unwrap();
    eventually(|| server.registry().namespaces_count() == 0)
        .await
        .unwrap();
}

// ============================================================================
// Channel Tests
// ============================================================================

#[tokio::test]
async fn test_public_subscribe_and_unsubscribe() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();

    let reply = client.subscribe(json!({"channel": "news"})).await.unwrap();
    assert_eq!(reply["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(reply["data"], "{}");
    assert!(server.registry().has_channel(APP_ID, "news"));

    client
        .send_event("pusher:unsubscribe", None, json!({"channel": "news"}))
        .await
        .unwrap();
    eventually(|| !server.registry().has_channel(APP_ID, "news"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_private_channel_authorization() {
    let server = server().await;
    let mut client = server.connect().await.unwrap();

    let auth = private_auth(&client.socket_id, "private-room");
    let reply = client
        .subscribe(json!({"channel": "private-room", "auth": auth}))
        .await
        .unwrap();
    assert_eq!(reply["event"], "pusher_internal:subscription_succeeded");

    let reply = client
        .subscribe(json!({"channel": "private-other", "auth": "app-key:deadbeef"}))
        .await
        .unwrap();
    assert_eq!(reply["event"], "pusher:subscription_error");
    assert_eq!(reply["data"]["type"], "AuthError");
    assert_eq!(reply["data"]["status"], 401);
}

#[tokio::test]
async fn test_presence_members() {
    let server = server().await;
    let channel = "presence-room";

    let mut alice = server.connect().await.unwrap();
    let alice_data = presence_data("alice", json!({"name": "Alice"}));
    let reply = alice
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&alice.socket_id, channel, &alice_data),
            "channel_data": alice_data,
        }))
        .await
        .unwrap();
    let presence = decode_data(&reply).unwrap();
    assert_eq!(presence["presence"]["count"], 1);
    assert_eq!(presence["presence"]["ids"], json!(["alice"]));

    let mut bob = server.connect().await.unwrap();
    let bob_data = presence_data("bob", json!({"name": "Bob"}));
    let reply = bob
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&bob.socket_id, channel, &bob_data),
            "channel_data": bob_data,
        }))
        .await
        .unwrap();
    let presence = decode_data(&reply).unwrap();
    assert_eq!(presence["presence"]["count"], 2);
    assert_eq!(presence["presence"]["hash"]["alice"], json!({"name": "Alice"}));

    let added = alice.expect("pusher_internal:member_added").await.unwrap();
    assert_eq!(decode_data(&added).unwrap()["user_id"], "bob");

    bob.close().await.unwrap();
    let removed = alice.expect("pusher_internal:member_removed").await.unwrap();
    assert_eq!(decode_data(&removed).unwrap(), json!({"user_id": "bob"}));
}

#[tokio::test]
async fn test_presence_same_user_twice_is_one_member() {
    let server = server().await;
    let channel = "presence-room";
    let data = presence_data("carol", json!({}));

    let mut first = server.connect().await.unwrap();
    first
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&first.socket_id, channel, &data),
            "channel_data": data,
        }))
        .await
        .unwrap();

    let mut second = server.connect().await.unwrap();
    let reply = second
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&second.socket_id, channel, &data),
            "channel_data": data,
        }))
        .await
        .unwrap();
    assert_eq!(decode_data(&reply).unwrap()["presence"]["count"], 1);

    first
        .expect_silence(Duration::from_millis(200))
        .await
        .unwrap();
}

// ============================================================================
// Client Event Tests
// ============================================================================

#[tokio::test]
async fn test_client_event_reaches_other_members() {
    let server = server().await;
    let channel = "private-chat";

    let mut sender = server.connect().await.unwrap();
    let mut receiver = server.connect().await.unwrap();
    for client in [&mut sender, &mut receiver] {
        let auth = private_auth(&client.socket_id, channel);
        client
            .subscribe(json!({"channel": channel, "auth": auth}))
            .await
            .unwrap();
    }

    sender
        .send_event("client-typing", Some(channel), json!({"who": "sender"}))
        .await
        .unwrap();

    let frame = receiver.expect("client-typing").await.unwrap();
    assert_eq!(frame["channel"], channel);
    assert_eq!(frame["data"], json!({"who": "sender"}));

    sender
        .expect_silence(Duration::from_millis(200))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_client_events_disabled() {
    let app = AppSchema {
        enable_client_messages: Some(false),
        ..test_app()
    };
    let server = TestServer::start(test_config(vec![app])).await.unwrap();
    let mut client = server.connect().await.unwrap();
    let auth = private_auth(&client.socket_id, "private-chat");
    client
        .subscribe(json!({"channel": "private-chat", "auth": auth}))
        .await
        .unwrap();

    client
        .send_event("client-typing", Some("private-chat"), json!({}))
        .await
        .unwrap();
    let frame = client.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4301);
    assert_eq!(frame["channel"], "private-chat");
    assert_eq!(client.closed().await.unwrap(), Closed::Code(4301));
}

// ============================================================================
// Cache Channel Tests
// ============================================================================

#[tokio::test]
async fn test_cache_channel_miss_then_hit() {
    let server = server().await;
    let mut first = server.connect().await.unwrap();

    first.subscribe(json!({"channel": "cache-scores"})).await.unwrap();
    let miss = first.expect("pusher:cache_miss").await.unwrap();
    assert_eq!(miss["channel"], "cache-scores");

    let (status, _) = server
        .publish(
            APP_ID,
            &json!({"name": "score", "channel": "cache-scores", "data": "{\"home\":1}"}),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);
    first.expect("score").await.unwrap();

    let mut second = server.connect().await.unwrap();
    second.subscribe(json!({"channel": "cache-scores"})).await.unwrap();
    let replay = second.expect("score").await.unwrap();
    assert_eq!(replay["data"], "{\"home\":1}");
}

// ============================================================================
// User Authentication Tests
// ============================================================================

fn auth_app(timeout_ms: u64) -> AppSchema {
    AppSchema {
        enable_user_authentication: Some(true),
        user_authentication_timeout: Some(timeout_ms),
        ..test_app()
    }
}

#[tokio::test]
async fn test_signin_success() {
    let server = TestServer::start(test_config(vec![auth_app(2_000)]))
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    let payload = signin_payload(&client.socket_id, &json!({"id": 42, "name": "Dana"}));
    client
        .send_event("pusher:signin", None, payload.clone())
        .await
        .unwrap();

    let frame = client.expect("pusher:signin_success").await.unwrap();
    assert_eq!(frame["data"], payload);
    assert_eq!(server.registry().user_connections(APP_ID, "42").len(), 1);
}

#[tokio::test]
async fn test_signin_timeout_closes() {
    let server = TestServer::start(test_config(vec![auth_app(100)]))
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    let frame = client.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4009);
    assert_eq!(client.closed().await.unwrap(), Closed::Code(4009));
}

#[tokio::test]
async fn test_signin_bad_signature_closes() {
    let server = TestServer::start(test_config(vec![auth_app(2_000)]))
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    client
        .send_event(
            "pusher:signin",
            None,
            json!({"auth": "app-key:00", "user_data": "{\"id\":\"1\"}"}),
        )
        .await
        .unwrap();

    let frame = client.expect("pusher:error").await.unwrap();
    assert_eq!(frame["data"]["code"], 4009);
    assert_eq!(client.closed().await.unwrap(), Closed::Code(4009));
}
