//! REST event publishing
//!
//! `POST /apps/:app_id/events` and `POST /apps/:app_id/batch_events`. Both
//! are signed with the app secret; see [`beacon_common::verify_request`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, Uri},
    Json,
};
use beacon_common::{verify_request, AppError, Token};
use beacon_core::{data_to_kilobytes, App, DomainError, SocketId};
use serde::Deserialize;
use serde_json::{json, Value};

use super::response::ApiResult;
use crate::server::GatewayState;

/// One event to publish
#[derive(Debug, Clone, Deserialize)]
pub struct PublishEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    /// Connection excluded from delivery
    #[serde(default)]
    pub socket_id: Option<String>,
}

/// Body of `batch_events`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEvents {
    pub batch: Vec<PublishEvent>,
}

impl PublishEvent {
    /// Target channels, whichever of `channels` / `channel` was given
    fn target_channels(&self) -> Vec<String> {
        match (&self.channels, &self.channel) {
            (Some(channels), _) => channels.clone(),
            (None, Some(channel)) => vec![channel.clone()],
            (None, None) => Vec::new(),
        }
    }

    /// Check the event against the app's limits
    pub fn validate(&self, app: &App) -> Result<Vec<String>, AppError> {
        let limits = &app.limits;
        let channels = self.target_channels();

        if channels.is_empty() {
            return Err(AppError::validation("channel or channels is required"));
        }
        if channels.len() > limits.max_event_channels_at_once {
            return Err(AppError::validation(format!(
                "cannot publish to more than {} channels at once",
                limits.max_event_channels_at_once
            )));
        }
        if let Some(channel) = channels
            .iter()
            .find(|channel| channel.len() > limits.max_channel_name_length)
        {
            tracing::debug!(channel = %channel, "Channel name too long");
            return Err(DomainError::ChannelNameTooLong {
                max: limits.max_channel_name_length,
            }
            .into());
        }
        if self.name.len() > limits.max_event_name_length {
            return Err(DomainError::EventNameTooLong {
                max: limits.max_event_name_length,
            }
            .into());
        }
        if data_to_kilobytes(&self.data) > limits.max_event_payload_in_kb {
            return Err(DomainError::EventPayloadTooLarge {
                max_kb: limits.max_event_payload_in_kb,
            }
            .into());
        }
        if let Some(socket_id) = &self.socket_id {
            if !SocketId::is_valid(socket_id) {
                return Err(AppError::validation(format!("invalid socket_id {socket_id}")));
            }
        }
        Ok(channels)
    }
}

/// Resolve the app and check the request signature
async fn authorize(
    state: &GatewayState,
    app_id: &str,
    uri: &Uri,
    query: &HashMap<String, String>,
    body: &[u8],
) -> ApiResult<Arc<App>> {
    let app = state
        .apps()
        .get_by_id(app_id)
        .await?
        .ok_or(DomainError::AppNotFound)?;

    let token = Token::new(app.key.clone(), app.secret.clone());
    if !verify_request(&token, Method::POST.as_str(), uri.path(), query, body) {
        return Err(AppError::InvalidSignature.into());
    }
    Ok(app)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(AppError::validation)
}

async fn publish(state: &GatewayState, app: &App, event: &PublishEvent, channels: &[String]) {
    state
        .registry()
        .publish_event(app, channels, &event.name, &event.data, event.socket_id.as_deref())
        .await;
}

/// Publish one event
///
/// POST /apps/:app_id/events
pub async fn publish_event(
    State(state): State<GatewayState>,
    Path(app_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let app = authorize(&state, &app_id, &uri, &query, &body).await?;
    let event: PublishEvent = parse_body(&body)?;
    let channels = event.validate(&app)?;

    if !state.allow_backend_events(&app, 1) {
        return Err(AppError::RateLimitExceeded.into());
    }

    publish(&state, &app, &event, &channels).await;
    tracing::info!(namespace = %app.id, event = %event.name, channels = channels.len(), "Event published over REST");
    Ok(Json(json!({})))
}

/// Publish a batch of events
///
/// POST /apps/:app_id/batch_events
pub async fn publish_batch(
    State(state): State<GatewayState>,
    Path(app_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let app = authorize(&state, &app_id, &uri, &query, &body).await?;
    let BatchEvents { batch } = parse_body(&body)?;

    if batch.len() > app.limits.max_event_batch_size {
        return Err(AppError::validation(format!(
            "cannot batch more than {} events",
            app.limits.max_event_batch_size
        ))
        .into());
    }
    let validated = batch
        .iter()
        .map(|event| event.validate(&app))
        .collect::<Result<Vec<_>, _>>()?;

    let count = u32::try_from(batch.len()).unwrap_or(u32::MAX);
    if !state.allow_backend_events(&app, count) {
        return Err(AppError::RateLimitExceeded.into());
    }

    for (event, channels) in batch.iter().zip(&validated) {
        publish(&state, &app, event, channels).await;
    }
    tracing::info!(namespace = %app.id, events = batch.len(), "Batch published over REST");
    Ok(Json(json!({})))
}

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(body: Value) -> PublishEvent {
        serde_json::from_value(body).unwrap()
    }

    fn app() -> App {
        App::new("app-1", "app-key", "app-secret")
    }

    #[test]
    fn test_single_channel() {
        let channels = event(json!({"name": "greet", "channel": "news", "data": "{}"}))
            .validate(&app())
            .unwrap();
        assert_eq!(channels, vec!["news".to_string()]);
    }

    #[test]
    fn test_missing_channel() {
        let err = event(json!({"name": "greet", "data": "{}"}))
            .validate(&app())
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_too_many_channels() {
        let mut app = app();
        app.limits.max_event_channels_at_once = 2;
        let err = event(json!({"name": "greet", "channels": ["a", "b", "c"], "data": "{}"}))
            .validate(&app)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_name_too_long() {
        let mut app = app();
        app.limits.max_event_name_length = 3;
        let err = event(json!({"name": "greeting", "channel": "news", "data": "{}"}))
            .validate(&app)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_payload_too_large() {
        let mut app = app();
        app.limits.max_event_payload_in_kb = 1.0;
        let err = event(json!({"name": "greet", "channel": "news", "data": "x".repeat(2048)}))
            .validate(&app)
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[test]
    fn test_invalid_socket_id() {
        let err = event(json!({"name": "greet", "channel": "news", "data": "{}", "socket_id": "nope"}))
            .validate(&app())
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
