//! WebSocket close codes
//!
//! Pusher protocol codes sent when the server closes a connection.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Application is disabled
    AppDisabled = 4003,
    /// Presence channel is full
    PresenceLimitReached = 4004,
    /// Unauthorized, unknown app or authentication timeout
    Unauthorized = 4009,
    /// Over the app's concurrent connection quota
    OverQuota = 4100,
    /// Server-side infrastructure failure
    ServerError = 4200,
    /// Client event or payload rejected
    ClientEventRejected = 4301,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4003 => Some(Self::AppDisabled),
            4004 => Some(Self::PresenceLimitReached),
            4009 => Some(Self::Unauthorized),
            4100 => Some(Self::OverQuota),
            4200 => Some(Self::ServerError),
            4301 => Some(Self::ClientEventRejected),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Codes in the 4000-4099 range tell Pusher clients not to reconnect
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        matches!(self, Self::OverQuota | Self::ServerError | Self::ClientEventRejected)
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AppDisabled => "Application disabled",
            Self::PresenceLimitReached => "Presence member limit reached",
            Self::Unauthorized => "Unauthorized",
            Self::OverQuota => "Over connection quota",
            Self::ServerError => "Server error",
            Self::ClientEventRejected => "Client event rejected",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
