//! Test fixtures: apps, configuration and signing helpers

use std::collections::HashMap;

use beacon_common::{AppConfig, Token};
use beacon_core::AppSchema;
use serde_json::{json, Value};

pub const APP_ID: &str = "app-id";
pub const APP_KEY: &str = "app-key";
pub const APP_SECRET: &str = "app-secret";

/// App with client messages enabled and default limits
pub fn test_app() -> AppSchema {
    AppSchema {
        id: Some(APP_ID.to_string()),
        key: Some(APP_KEY.to_string()),
        secret: Some(APP_SECRET.to_string()),
        enable_client_messages: Some(true),
        ..AppSchema::default()
    }
}

/// Configuration serving `apps`, with a short close grace
pub fn test_config(apps: Vec<AppSchema>) -> AppConfig {
    let vars: HashMap<&str, &str> = [("CLOSE_GRACE_MS", "10"), ("GOSSIP_NODE_ID", "node-a")]
        .into_iter()
        .collect();
    let mut config = AppConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string()))
        .expect("test configuration is valid");
    config.apps = apps;
    config
}

pub fn token() -> Token {
    Token::new(APP_KEY, APP_SECRET)
}

/// `auth` for a private channel subscription
pub fn private_auth(socket_id: &str, channel: &str) -> String {
    token().auth_string(&format!("{socket_id}:{channel}"))
}

/// `channel_data` for a presence member
pub fn presence_data(user_id: &str, info: Value) -> String {
    json!({ "user_id": user_id, "user_info": info }).to_string()
}

/// `auth` for a presence channel subscription
pub fn presence_auth(socket_id: &str, channel: &str, channel_data: &str) -> String {
    token().auth_string(&format!("{socket_id}:{channel}:{channel_data}"))
}

/// `data` of a `pusher:signin` frame for `user_data`
pub fn signin_payload(socket_id: &str, user_data: &Value) -> Value {
    let user_data = user_data.to_string();
    json!({
        "auth": token().auth_string(&format!("{socket_id}::user::{user_data}")),
        "user_data": user_data,
    })
}
