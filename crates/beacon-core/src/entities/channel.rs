//! Channel kinds - the authorization tier implied by a channel name

use serde::{Deserialize, Serialize};

const PRESENCE_PREFIX: &str = "presence-";
const ENCRYPTED_PRIVATE_PREFIX: &str = "private-encrypted-";
const PRIVATE_PREFIX: &str = "private-";
const CLIENT_EVENT_PREFIX: &str = "client-";

const CACHE_PREFIXES: [&str; 4] = [
    "cache-",
    "private-cache-",
    "private-encrypted-cache-",
    "presence-cache-",
];

/// Channel kind, derived purely from the channel name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Public,
    Private,
    EncryptedPrivate,
    Presence,
}

impl ChannelKind {
    /// Resolve the kind of `channel`. Prefixes are checked in a fixed order,
    /// so `private-presence-x` is Private and `presence-private-x` is Presence.
    #[must_use]
    pub fn resolve(channel: &str) -> Self {
        if channel.starts_with(PRESENCE_PREFIX) {
            Self::Presence
        } else if channel.starts_with(ENCRYPTED_PRIVATE_PREFIX) {
            Self::EncryptedPrivate
        } else if channel.starts_with(PRIVATE_PREFIX) {
            Self::Private
        } else {
            Self::Public
        }
    }

    /// Whether joining requires a signed `auth` token
    #[inline]
    #[must_use]
    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::Public)
    }

    #[inline]
    #[must_use]
    pub fn is_presence(self) -> bool {
        matches!(self, Self::Presence)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::EncryptedPrivate => "private-encrypted",
            Self::Presence => "presence",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the channel keeps its last event for late subscribers
#[must_use]
pub fn is_cache_channel(channel: &str) -> bool {
    CACHE_PREFIXES.iter().any(|prefix| channel.starts_with(prefix))
}

/// Whether an event name is a client event
#[must_use]
pub fn is_client_event(event: &str) -> bool {
    event.starts_with(CLIENT_EVENT_PREFIX)
}
