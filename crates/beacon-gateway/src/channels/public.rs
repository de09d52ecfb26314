//! Public channels: anyone may join

use beacon_core::PresenceMember;

use super::JoinOutcome;
use crate::connection::{Connection, Membership};

pub(super) fn join(membership: &mut Membership<'_>, conn: &Connection, channel: &str) -> JoinOutcome {
    join_as(membership, conn, channel, None)
}

pub(super) fn join_as(
    membership: &mut Membership<'_>,
    conn: &Connection,
    channel: &str,
    member: Option<PresenceMember>,
) -> JoinOutcome {
    let new_member = member
        .as_ref()
        .is_some_and(|m| !membership.has_presence_user(channel, &m.user_id));
    let connections = membership.add_to_channel(conn, channel, member.clone());
    JoinOutcome {
        connections,
        member,
        new_member,
        rejoined: false,
    }
}
