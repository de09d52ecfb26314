//! `pusher:signin` handling

use std::sync::Arc;

use serde_json::Value;

use super::{HandlerError, HandlerResult};
use crate::connection::{Connection, ConnectionRegistry};

/// User authentication handler
pub struct SigninHandler;

impl SigninHandler {
    pub async fn handle(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        data: Option<Value>,
    ) -> HandlerResult<()> {
        let data = data
            .ok_or_else(|| HandlerError::InvalidPayload("pusher:signin without data".to_string()))?;
        registry.handle_signin(connection, data).await;
        Ok(())
    }
}
