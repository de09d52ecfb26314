//! Channel managers
//!
//! A channel name maps to one of four managers. Each decides whether a
//! connection may join and mutates membership only through [`Membership`].

mod presence;
mod private;
mod public;

use std::sync::Arc;

use beacon_core::{App, ChannelKind, DomainError, PresenceMember};

use crate::connection::{Connection, Membership};

/// Subscription request as sent by the client
#[derive(Debug, Clone, Copy)]
pub struct JoinRequest<'a> {
    pub channel: &'a str,
    pub auth: Option<&'a str>,
    pub channel_data: Option<&'a str>,
}

impl<'a> JoinRequest<'a> {
    #[must_use]
    pub fn new(channel: &'a str) -> Self {
        Self {
            channel,
            auth: None,
            channel_data: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: &'a str) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_channel_data(mut self, channel_data: &'a str) -> Self {
        self.channel_data = Some(channel_data);
        self
    }
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// Local connections in the channel after the join
    pub connections: usize,
    pub member: Option<PresenceMember>,
    /// The member's user id was not in the channel before
    pub new_member: bool,
    /// The connection was already a member; nothing changed
    pub rejoined: bool,
}

/// Result of a leave
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveResponse {
    /// The connection was a member before the call
    pub left: bool,
    pub remaining_connections: usize,
    pub member: Option<PresenceMember>,
}

/// Join/leave rules for one channel kind
#[derive(Debug, Clone)]
pub struct ChannelManager {
    kind: ChannelKind,
    app: Arc<App>,
}

impl ChannelManager {
    #[must_use]
    pub fn new(kind: ChannelKind, app: Arc<App>) -> Self {
        Self { kind, app }
    }

    /// Manager responsible for `channel`
    #[must_use]
    pub fn for_channel(channel: &str, app: Arc<App>) -> Self {
        Self::new(ChannelKind::resolve(channel), app)
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn join(
        &self,
        membership: &mut Membership<'_>,
        conn: &Connection,
        request: &JoinRequest<'_>,
    ) -> Result<JoinOutcome, DomainError> {
        if membership.is_member(conn.id(), request.channel) {
            return Ok(JoinOutcome {
                connections: membership.local_connections_count(request.channel),
                member: conn.presence_member(request.channel),
                new_member: false,
                rejoined: true,
            });
        }
        match self.kind {
            ChannelKind::Public => Ok(public::join(membership, conn, request.channel)),
            ChannelKind::Private | ChannelKind::EncryptedPrivate => {
                private::authorize(&self.app, conn, request)?;
                Ok(public::join(membership, conn, request.channel))
            }
            ChannelKind::Presence => presence::join(&self.app, membership, conn, request),
        }
    }

    pub fn leave(
        &self,
        membership: &mut Membership<'_>,
        conn: &Connection,
        channel: &str,
    ) -> LeaveResponse {
        let left = membership.is_member(conn.id(), channel);
        let member = conn.presence_member(channel);
        let remaining_connections = membership.remove_from_channel(conn, channel);
        LeaveResponse {
            left,
            remaining_connections,
            member: member.filter(|_| self.kind.is_presence()),
        }
    }
}
