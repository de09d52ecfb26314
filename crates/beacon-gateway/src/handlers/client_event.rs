//! `client-*` event handling

use std::sync::Arc;

use serde_json::Value;

use super::{HandlerError, HandlerResult};
use crate::connection::{Connection, ConnectionRegistry};

/// Relays client events to the other members of a channel
pub struct ClientEventHandler;

impl ClientEventHandler {
    pub async fn handle(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        event: &str,
        channel: Option<String>,
        data: Option<Value>,
    ) -> HandlerResult<()> {
        let channel = channel.ok_or_else(|| HandlerError::MissingChannel(event.to_string()))?;
        let data = data.ok_or_else(|| HandlerError::MissingData(event.to_string()))?;
        registry
            .handle_client_event(connection, event, &channel, data)
            .await;
        Ok(())
    }
}
