//! Presence channels: private channels that also track who is in them

use beacon_core::{App, DomainError, PresenceMember};

use super::{private, public, JoinOutcome, JoinRequest};
use crate::connection::{Connection, Membership};

pub(super) fn join(
    app: &App,
    membership: &mut Membership<'_>,
    conn: &Connection,
    request: &JoinRequest<'_>,
) -> Result<JoinOutcome, DomainError> {
    let limits = &app.limits;

    if membership.presence_members_count(request.channel) + 1 > limits.max_presence_members_per_channel {
        return Err(DomainError::PresenceMembersLimit);
    }

    let channel_data = request.channel_data.ok_or(DomainError::Unauthorized)?;
    let member = PresenceMember::from_channel_data(channel_data)
        .map_err(|_| DomainError::Unauthorized)?;

    if member.info_size_kb() > limits.max_presence_member_size_in_kb {
        return Err(DomainError::PresenceMemberTooLarge {
            max_kb: limits.max_presence_member_size_in_kb,
        });
    }

    let input = format!("{}:{}:{}", conn.id(), request.channel, channel_data);
    private::verify(app, &input, request.auth)?;

    Ok(public::join_as(membership, conn, request.channel, Some(member)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::NamespaceState;
    use beacon_common::{ConnectionConfig, Token};
    use serde_json::json;
    use std::sync::Arc;

    fn app_with(configure: impl FnOnce(&mut App)) -> App {
        let mut app = App::new("app-1", "app-key", "app-secret");
        configure(&mut app);
        app
    }

    fn connect(state: &mut NamespaceState) -> Arc<Connection> {
        let (conn, _rx) = Connection::open("app-1", &ConnectionConfig::default());
        state.connections.insert(conn.id().clone(), conn.clone());
        conn
    }

    fn signed<'a>(conn: &Connection, channel_data: &'a str, auth: &'a mut String) -> JoinRequest<'a> {
        *auth = Token::new("app-key", "app-secret")
            .auth_string(&format!("{}:presence-room:{channel_data}", conn.id()));
        JoinRequest::new("presence-room")
            .with_auth(auth.as_str())
            .with_channel_data(channel_data)
    }

    #[tokio::test]
    async fn test_member_limit_checked_first() {
        let app = app_with(|app| app.limits.max_presence_members_per_channel = 1);
        let mut state = NamespaceState::default();
        let first = connect(&mut state);
        let second = connect(&mut state);

        let data = json!({"user_id": "1"}).to_string();
        let mut auth = String::new();
        join(&app, &mut state.membership(), &first, &signed(&first, &data, &mut auth)).unwrap();

        // Unsigned and undecodable, still reported as the limit
        let request = JoinRequest::new("presence-room").with_channel_data("not json");
        let err = join(&app, &mut state.membership(), &second, &request).unwrap_err();
        assert!(matches!(err, DomainError::PresenceMembersLimit));
        assert_eq!(err.code(), 4004);
    }

    #[tokio::test]
    async fn test_bad_channel_data_is_unauthorized() {
        let app = app_with(|_| {});
        let mut state = NamespaceState::default();
        let conn = connect(&mut state);

        let request = JoinRequest::new("presence-room").with_auth("app-key:00");
        assert!(matches!(
            join(&app, &mut state.membership(), &conn, &request),
            Err(DomainError::Unauthorized)
        ));

        let request = request.with_channel_data("{\"user_info\":{}}");
        assert!(matches!(
            join(&app, &mut state.membership(), &conn, &request),
            Err(DomainError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_member_size_checked_before_signature() {
        let app = app_with(|app| app.limits.max_presence_member_size_in_kb = 0.01);
        let mut state = NamespaceState::default();
        let conn = connect(&mut state);

        let data = json!({"user_id": "1", "user_info": {"bio": "x".repeat(64)}}).to_string();
        let request = JoinRequest::new("presence-room")
            .with_auth("app-key:00")
            .with_channel_data(&data);
        let err = join(&app, &mut state.membership(), &conn, &request).unwrap_err();
        assert!(matches!(err, DomainError::PresenceMemberTooLarge { .. }));
        assert_eq!(err.code(), 4301);
    }

    #[tokio::test]
    async fn test_second_socket_of_same_user_is_not_new() {
        let app = app_with(|_| {});
        let mut state = NamespaceState::default();
        let a = connect(&mut state);
        let b = connect(&mut state);
        let data = json!({"user_id": 5, "user_info": {}}).to_string();

        let mut auth = String::new();
        let outcome = join(&app, &mut state.membership(), &a, &signed(&a, &data, &mut auth)).unwrap();
        assert!(outcome.new_member);

        let outcome = join(&app, &mut state.membership(), &b, &signed(&b, &data, &mut auth)).unwrap();
        assert!(!outcome.new_member);
        assert_eq!(outcome.connections, 2);
        assert_eq!(state.membership().presence_members_count("presence-room"), 1);
    }
}
