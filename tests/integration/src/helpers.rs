//! Test helpers for integration tests
//!
//! Provides a server spawned on an ephemeral port, a WebSocket client that
//! speaks the Pusher frame format, and signed REST calls.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use beacon_common::{body_md5, sign_request, AppConfig};
use beacon_core::StaticAppRegistry;
use beacon_gateway::connection::{ConnectionRegistry, RegistrySettings};
use beacon_gateway::gossip::LocalGossipNetwork;
use beacon_gateway::{create_app, create_gateway_state, GatewayState};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::{token, APP_KEY};

/// How long a client waits for an expected frame
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub client: Client,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    /// Start a standalone server
    pub async fn start(config: AppConfig) -> Result<Self> {
        let state = create_gateway_state(config)?;
        Self::serve(state).await
    }

    /// Start one node of a cluster gossiping over `network`
    pub async fn start_node(
        network: &LocalGossipNetwork,
        node_id: &str,
        config: AppConfig,
    ) -> Result<Self> {
        let registry = ConnectionRegistry::builder(
            Arc::new(StaticAppRegistry::new(config.build_apps())),
            Arc::new(network.node(node_id)),
        )
        .settings(RegistrySettings::from_config(&config))
        .build();
        Self::serve(GatewayState::new(registry, config)).await
    }

    async fn serve(state: GatewayState) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = create_app(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            state,
            client,
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, app_key: &str) -> String {
        format!("ws://{}/app/{app_key}?protocol=7", self.addr)
    }

    /// Open a WebSocket for the default app and wait for the handshake
    pub async fn connect(&self) -> Result<WsClient> {
        let mut client = self.connect_raw(APP_KEY).await?;
        let established = client.expect("pusher:connection_established").await?;
        let data = decode_data(&established)?;
        client.socket_id = data["socket_id"]
            .as_str()
            .context("socket_id missing")?
            .to_string();
        Ok(client)
    }

    /// Open a WebSocket without reading anything
    pub async fn connect_raw(&self, app_key: &str) -> Result<WsClient> {
        let (stream, _) = connect_async(self.ws_url(app_key)).await?;
        Ok(WsClient {
            stream,
            socket_id: String::new(),
        })
    }

    /// POST a signed body to `/apps/{app_id}/{endpoint}`
    pub async fn post_signed(
        &self,
        app_id: &str,
        endpoint: &str,
        body: &Value,
        secret_ok: bool,
    ) -> Result<(StatusCode, Value)> {
        let path = format!("/apps/{app_id}/{endpoint}");
        let body = body.to_string();

        let mut query: HashMap<String, String> = HashMap::new();
        query.insert("auth_key".to_string(), APP_KEY.to_string());
        query.insert("auth_timestamp".to_string(), "1700000000".to_string());
        query.insert("auth_version".to_string(), "1.0".to_string());
        query.insert("body_md5".to_string(), body_md5(body.as_bytes()));
        let signer = if secret_ok {
            token()
        } else {
            beacon_common::Token::new(APP_KEY, "not-the-secret")
        };
        let signature = sign_request(&signer, "POST", &path, &query, body.as_bytes());
        query.insert("auth_signature".to_string(), signature);

        let response = self
            .client
            .post(format!("{}{path}", self.base_url()))
            .query(&query)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let json = response.json().await.unwrap_or(Value::Null);
        Ok((status, json))
    }

    /// Publish one event through the REST API
    pub async fn publish(&self, app_id: &str, body: &Value) -> Result<(StatusCode, Value)> {
        self.post_signed(app_id, "events", body, true).await
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.state.registry()
    }
}

/// WebSocket client speaking Pusher frames
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub socket_id: String,
}

/// How a socket ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closed {
    Code(u16),
    NoFrame,
}

impl WsClient {
    pub async fn send_json(&mut self, frame: &Value) -> Result<()> {
        self.stream.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    pub async fn send_event(&mut self, event: &str, channel: Option<&str>, data: Value) -> Result<()> {
        let mut frame = json!({ "event": event, "data": data });
        if let Some(channel) = channel {
            frame["channel"] = json!(channel);
        }
        self.send_json(&frame).await
    }

    /// Next JSON frame, skipping transport frames
    pub async fn next_frame(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a frame")?
                .context("socket ended")??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => bail!("socket closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Read frames until one named `event` arrives
    pub async fn expect(&mut self, event: &str) -> Result<Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["event"] == event {
                return Ok(frame);
            }
        }
    }

    /// Assert that nothing arrives for `wait`
    pub async fn expect_silence(&mut self, wait: Duration) -> Result<()> {
        match tokio::time::timeout(wait, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(other) => bail!("unexpected frame: {other:?}"),
        }
    }

    /// Wait for the close frame, returning its code
    pub async fn closed(&mut self) -> Result<Closed> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for close")?;
            match message {
                Some(Ok(Message::Close(Some(frame)))) => return Ok(Closed::Code(frame.code.into())),
                Some(Ok(Message::Close(None))) | None | Some(Err(_)) => return Ok(Closed::NoFrame),
                Some(Ok(_)) => {}
            }
        }
    }

    pub async fn subscribe(&mut self, data: Value) -> Result<Value> {
        let channel = data["channel"].as_str().unwrap_or_default().to_string();
        self.send_event("pusher:subscribe", None, data).await?;
        loop {
            let frame = self.next_frame().await?;
            let done = frame["event"] == "pusher_internal:subscription_succeeded"
                || frame["event"] == "pusher:subscription_error";
            if done && frame["channel"] == channel.as_str() {
                return Ok(frame);
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Decode a frame's string-encoded `data`
pub fn decode_data(frame: &Value) -> Result<Value> {
    match &frame["data"] {
        Value::String(raw) => Ok(serde_json::from_str(raw)?),
        other => Ok(other.clone()),
    }
}

/// Poll `check` until it holds or the frame timeout passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + FRAME_TIMEOUT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not reached in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
