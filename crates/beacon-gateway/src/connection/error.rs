//! Registry errors

use beacon_core::{DomainError, SocketId};

/// Why a connection was not registered
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The client has been told and the connection is closing
    #[error("Connection rejected: {0}")]
    Rejected(#[from] DomainError),

    /// Another connection already holds this id; nothing was changed
    #[error("Connection {0} is already registered")]
    DuplicateConnection(SocketId),
}

impl RegistryError {
    /// Close code sent to the client, if it was closed
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Rejected(err) => Some(err.code()),
            Self::DuplicateConnection(_) => None,
        }
    }
}
