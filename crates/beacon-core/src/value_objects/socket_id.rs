//! Socket ids - connection identifiers in the Pusher `"<int>.<int>"` format

use std::borrow::Borrow;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

const SOCKET_ID_PART_MAX: u64 = 10_000_000_000;

/// Identifier of one connection, unique within its namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(String);

impl SocketId {
    /// Generate a random socket id
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let left = rng.gen_range(0..=SOCKET_ID_PART_MAX);
        let right = rng.gen_range(0..=SOCKET_ID_PART_MAX);
        Self(format!("{left}.{right}"))
    }

    /// Check whether `value` has the `"<digits>.<digits>"` shape
    #[must_use]
    pub fn is_valid(value: &str) -> bool {
        match value.split_once('.') {
            Some((left, right)) => {
                !left.is_empty()
                    && !right.is_empty()
                    && left.bytes().all(|b| b.is_ascii_digit())
                    && right.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SocketId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SocketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for SocketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SocketId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
