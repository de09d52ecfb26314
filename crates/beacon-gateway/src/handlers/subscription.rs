//! `pusher:subscribe` and `pusher:unsubscribe` handling

use std::sync::Arc;

use serde_json::Value;

use super::{HandlerError, HandlerResult};
use crate::connection::{Connection, ConnectionRegistry};
use crate::protocol::{SubscribeData, UnsubscribeData};

/// Channel subscription handler
pub struct SubscriptionHandler;

impl SubscriptionHandler {
    pub async fn subscribe(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        data: Option<Value>,
    ) -> HandlerResult<()> {
        let data: SubscribeData = decode(data, "pusher:subscribe")?;
        registry.subscribe_to_channel(connection, &data).await;
        Ok(())
    }

    pub async fn unsubscribe(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        data: Option<Value>,
    ) -> HandlerResult<()> {
        let data: UnsubscribeData = decode(data, "pusher:unsubscribe")?;
        registry
            .unsubscribe_from_channel(connection, &data.channel)
            .await;
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Option<Value>, event: &str) -> HandlerResult<T> {
    let data = data.ok_or_else(|| HandlerError::InvalidPayload(format!("{event} without data")))?;
    Ok(serde_json::from_value(data)?)
}
