//! Handler error types

use thiserror::Error;

/// Inbound frame that could not be handled
///
/// These are protocol errors: they are logged and the frame is dropped,
/// the connection stays open.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame or its `data` did not decode
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Event name outside the protocol vocabulary
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Client event without a channel
    #[error("Event {0} requires a channel")]
    MissingChannel(String),

    /// Client event without a `data` payload
    #[error("Event {0} requires data")]
    MissingData(String),
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
