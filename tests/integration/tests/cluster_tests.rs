//! Multi-node tests: two servers gossiping over an in-process network
//!
//! Run with: cargo test -p integration-tests --test cluster_tests

use beacon_gateway::gossip::LocalGossipNetwork;
use integration_tests::*;
use serde_json::json;

async fn cluster() -> (TestServer, TestServer) {
    let network = LocalGossipNetwork::new();
    let a = TestServer::start_node(&network, "node-a", test_config(vec![test_app()]))
        .await
        .expect("Failed to start node a");
    let b = TestServer::start_node(&network, "node-b", test_config(vec![test_app()]))
        .await
        .expect("Failed to start node b");
    (a, b)
}

#[tokio::test]
async fn test_publish_on_one_node_reaches_the_other() {
    let (a, b) = cluster().await;
    let mut on_a = a.connect().await.unwrap();
    let mut on_b = b.connect().await.unwrap();
    on_a.subscribe(json!({"channel": "news"})).await.unwrap();
    on_b.subscribe(json!({"channel": "news"})).await.unwrap();

    let (status, _) = a
        .publish(APP_ID, &json!({"name": "headline", "channel": "news", "data": "{}"}))
        .await
        .unwrap();
    assert_eq!(status, 200);

    on_a.expect("headline").await.unwrap();
    let frame = on_b.expect("headline").await.unwrap();
    assert_eq!(frame["channel"], "news");
}

#[tokio::test]
async fn test_nodes_learn_connections_announced_after_they_join() {
    let (a, b) = cluster().await;
    let _on_a = a.connect().await.unwrap();
    let _on_b = b.connect().await.unwrap();

    eventually(|| a.registry().connections_count(APP_ID) == 2)
        .await
        .unwrap();
    assert_eq!(a.registry().local_connections_count(APP_ID), 1);
    assert_eq!(b.registry().local_connections_count(APP_ID), 1);
}

#[tokio::test]
async fn test_late_node_learns_existing_state() {
    let network = LocalGossipNetwork::new();
    let a = TestServer::start_node(&network, "node-a", test_config(vec![test_app()]))
        .await
        .expect("Failed to start node a");
    let channel = "presence-lobby";
    let mut alice = a.connect().await.unwrap();
    let alice_data = presence_data("alice", json!({"node": "a"}));
    alice
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&alice.socket_id, channel, &alice_data),
            "channel_data": alice_data,
        }))
        .await
        .unwrap();

    // Node b only opens the namespace after alice is already present
    let b = TestServer::start_node(&network, "node-b", test_config(vec![test_app()]))
        .await
        .expect("Failed to start node b");
    let _bob = b.connect().await.unwrap();

    eventually(|| b.registry().channel_members(APP_ID, channel).contains_key("alice"))
        .await
        .unwrap();
    assert_eq!(b.registry().connections_count(APP_ID), 2);
}

#[tokio::test]
async fn test_client_event_crosses_nodes() {
    let (a, b) = cluster().await;
    let channel = "private-chat";
    let mut sender = a.connect().await.unwrap();
    let mut receiver = b.connect().await.unwrap();
    for client in [&mut sender, &mut receiver] {
        let auth = private_auth(&client.socket_id, channel);
        client
            .subscribe(json!({"channel": channel, "auth": auth}))
            .await
            .unwrap();
    }

    sender
        .send_event("client-wave", Some(channel), json!({"hi": true}))
        .await
        .unwrap();
    let frame = receiver.expect("client-wave").await.unwrap();
    assert_eq!(frame["data"], json!({"hi": true}));
}

#[tokio::test]
async fn test_presence_spans_nodes() {
    let (a, b) = cluster().await;
    let channel = "presence-lobby";

    // Both nodes must be listening on the namespace before anyone joins
    let mut bob = b.connect().await.unwrap();
    let mut alice = a.connect().await.unwrap();
    let alice_data = presence_data("alice", json!({"node": "a"}));
    alice
        .subscribe(json!({
            "channel": channel,
            "auth": presence_auth(&alice.socket_id, channel, &alice_data),
            "channel_data": alice_data,
        }))
        .await
        .unwrap();
    eventually(|| b.registry().channel_members(APP_ID, channel).contains_key("alice"))
        .await
        .unwrap();

    let bob_data = presence_data("bob", json!({"node": "b"}));
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
    assert_eq!(presence["presence"]["hash"]["alice"], json!({"node": "a"}));

    let added = alice.expect("pusher_internal:member_added").await.unwrap();
    assert_eq!(decode_data(&added).unwrap()["user_id"], "bob");

    bob.close().await.unwrap();
    let removed = alice.expect("pusher_internal:member_removed").await.unwrap();
    assert_eq!(decode_data(&removed).unwrap()["user_id"], "bob");
}
