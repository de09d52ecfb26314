//! WebSocket handler
//!
//! Bridges an upgraded socket to a registry [`Connection`]: a writer task
//! drains the connection's outbound queue, the reader feeds the dispatcher.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use beacon_core::{App, DomainError, SocketId};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;

use crate::connection::{Connection, ConnectionRegistry, Frame};
use crate::handlers::MessageDispatcher;
use crate::protocol::CloseCode;
use crate::server::GatewayState;

/// Close code used when a close frame carries none
const NORMAL_CLOSURE: u16 = 1000;

/// WebSocket endpoint, `GET /app/:app_key`
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Path(app_key): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, app_key, socket))
}

async fn resolve_app(state: &GatewayState, app_key: &str) -> Option<Arc<App>> {
    match state.apps().get_by_key(app_key).await {
        Ok(app) => app,
        Err(e) => {
            tracing::warn!(app_key = %app_key, error = %e, "App lookup failed");
            None
        }
    }
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, app_key: String, socket: WebSocket) {
    let app = resolve_app(&state, &app_key).await;
    let namespace = app.as_ref().map_or_else(String::new, |app| app.id.clone());

    let (conn, rx) = Connection::open(namespace, &state.config().connection);
    let (ws_sink, ws_stream) = socket.split();
    let mut send_task = tokio::spawn(write_frames(ws_sink, rx, conn.id().clone()));

    let registry = state.registry().clone();
    let admitted = match app {
        Some(_) => match registry.new_connection(&conn).await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(socket_id = %conn.id(), error = %e, "Connection refused");
                conn.close(e.close_code(), e.to_string());
                false
            }
        },
        None => {
            tracing::info!(socket_id = %conn.id(), app_key = %app_key, "Unknown app key");
            conn.send_error_and_close(&DomainError::AppNotFound);
            false
        }
    };

    if !admitted {
        // Flush the error and close frames
        let _ = send_task.await;
        return;
    }

    tracing::info!(socket_id = %conn.id(), namespace = %conn.namespace(), "WebSocket connection established");

    let mut recv_task = tokio::spawn(read_frames(ws_stream, registry.clone(), conn.clone()));

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(socket_id = %conn.id(), "Send task ended");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(socket_id = %conn.id(), "Receive task ended");
        }
    }

    registry.remove_connection(&conn, None).await;
    send_task.abort();
    tracing::info!(socket_id = %conn.id(), "Connection cleaned up");
}

/// Feed client frames to the dispatcher until the socket ends
async fn read_frames(
    mut stream: SplitStream<WebSocket>,
    registry: Arc<ConnectionRegistry>,
    conn: Arc<Connection>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                conn.touch();
                if let Err(e) = MessageDispatcher::dispatch_text(&registry, &conn, &text).await {
                    tracing::debug!(socket_id = %conn.id(), error = %e, "Dropped client frame");
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(socket_id = %conn.id(), "Binary messages not supported");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                tracing::trace!(socket_id = %conn.id(), "Keep-alive frame");
                conn.touch();
            }
            Ok(Message::Close(_)) => {
                tracing::info!(socket_id = %conn.id(), "Client closed connection");
                return;
            }
            Err(e) => {
                tracing::warn!(socket_id = %conn.id(), error = %e, "WebSocket error");
                return;
            }
        }
    }
}

/// Drain the outbound queue onto the socket
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Frame>,
    socket_id: SocketId,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Text(text) => {
                if sink.send(Message::Text(text)).await.is_err() {
                    tracing::warn!(socket_id = %socket_id, "Failed to send message to WebSocket");
                    return;
                }
            }
            Frame::Close { code, reason } => {
                let code = code.unwrap_or(NORMAL_CLOSURE);
                tracing::debug!(
                    socket_id = %socket_id,
                    code,
                    description = CloseCode::from_u16(code).map_or("normal closure", CloseCode::description),
                    "Sending close frame"
                );
                let close = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}
