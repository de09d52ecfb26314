//! Inbound event handlers
//!
//! Decodes client frames and routes them to the registry. Every inbound
//! event name maps to exactly one handler.

mod client_event;
mod error;
mod ping;
mod signin;
mod subscription;

pub use client_event::ClientEventHandler;
pub use error::{HandlerError, HandlerResult};
pub use ping::PingHandler;
pub use signin::SigninHandler;
pub use subscription::SubscriptionHandler;

use std::sync::Arc;

use beacon_core::is_client_event;

use crate::connection::{Connection, ConnectionRegistry};
use crate::protocol::{messages, ClientMessage};

/// Events a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEvent {
    Ping,
    Pong,
    Subscribe,
    Unsubscribe,
    Signin,
    ClientEvent,
}

impl InboundEvent {
    #[must_use]
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            messages::PING => Some(Self::Ping),
            messages::PONG => Some(Self::Pong),
            messages::SUBSCRIBE => Some(Self::Subscribe),
            messages::UNSUBSCRIBE => Some(Self::Unsubscribe),
            messages::SIGNIN => Some(Self::Signin),
            event if is_client_event(event) => Some(Self::ClientEvent),
            _ => None,
        }
    }
}

/// Dispatch incoming client messages to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Decode a text frame and dispatch it
    pub async fn dispatch_text(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        text: &str,
    ) -> HandlerResult<()> {
        let message = ClientMessage::from_json(text)?;
        Self::dispatch(registry, connection, message).await
    }

    /// Handle an incoming client message
    pub async fn dispatch(
        registry: &ConnectionRegistry,
        connection: &Arc<Connection>,
        message: ClientMessage,
    ) -> HandlerResult<()> {
        let Some(event) = InboundEvent::parse(&message.event) else {
            return Err(HandlerError::UnknownEvent(message.event));
        };

        tracing::debug!(
            socket_id = %connection.id(),
            event = %message.event,
            "Dispatching client message"
        );

        match event {
            InboundEvent::Ping => {
                PingHandler::handle(connection);
                Ok(())
            }
            InboundEvent::Pong => {
                PingHandler::handle_pong(connection);
                Ok(())
            }
            InboundEvent::Subscribe => {
                SubscriptionHandler::subscribe(registry, connection, message.data).await
            }
            InboundEvent::Unsubscribe => {
                SubscriptionHandler::unsubscribe(registry, connection, message.data).await
            }
            InboundEvent::Signin => SigninHandler::handle(registry, connection, message.data).await,
            InboundEvent::ClientEvent => {
                ClientEventHandler::handle(
                    registry,
                    connection,
                    &message.event,
                    message.channel,
                    message.data,
                )
                .await
            }
        }
    }
}
