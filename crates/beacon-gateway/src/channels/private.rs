//! Private and encrypted-private channels: signed by the app's backend

use beacon_common::Token;
use beacon_core::{App, DomainError};

use super::JoinRequest;
use crate::connection::Connection;

/// Check `auth` against the signature of `"{socket_id}:{channel}"`
pub(super) fn authorize(
    app: &App,
    conn: &Connection,
    request: &JoinRequest<'_>,
) -> Result<(), DomainError> {
    let input = format!("{}:{}", conn.id(), request.channel);
    verify(app, &input, request.auth)
}

pub(super) fn verify(app: &App, input: &str, auth: Option<&str>) -> Result<(), DomainError> {
    let token = Token::new(app.key.as_str(), app.secret.as_str());
    match auth {
        Some(auth) if token.verify_auth_string(input, auth) => Ok(()),
        _ => Err(DomainError::Unauthorized),
    }
}
