//! Signed-in user attached to a connection

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User identity bound by `pusher:signin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// The decoded `user_data` as supplied by the app
    pub data: Value,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), data }
    }
}
