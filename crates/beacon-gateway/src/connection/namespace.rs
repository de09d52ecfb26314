//! Per-namespace state
//!
//! Everything the registry knows about one app lives behind a single mutex:
//! local connections, channel membership, the user index, and the view of
//! connections held by other nodes. Nothing awaits while it is locked.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use beacon_core::{App, PresenceMember, SocketId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{Notify, OnceCell};

use super::Connection;

pub(crate) struct Namespace {
    app: RwLock<Arc<App>>,
    pub(crate) state: Mutex<NamespaceState>,
    /// Completes once the gossip subscription is in place
    pub(crate) ready: OnceCell<()>,
    /// Woken once a retired namespace has been dropped from the registry
    pub(crate) released: Notify,
}

impl Namespace {
    pub(crate) fn new(app: Arc<App>) -> Self {
        Self {
            app: RwLock::new(app),
            state: Mutex::new(NamespaceState::default()),
            ready: OnceCell::new(),
            released: Notify::new(),
        }
    }

    pub(crate) fn app(&self) -> Arc<App> {
        self.app.read().clone()
    }

    /// Swap in a newer snapshot of the app record
    pub(crate) fn refresh_app(&self, app: Arc<App>) {
        *self.app.write() = app;
    }
}

#[derive(Default)]
struct PresenceSlot {
    info: Value,
    sockets: HashSet<SocketId>,
}

#[derive(Default)]
struct LocalChannel {
    members: HashSet<SocketId>,
    /// user_id -> info; the first socket to join decides the info
    presence: BTreeMap<String, PresenceSlot>,
}

/// A connection held by another node, as learned from gossip
#[derive(Debug, Clone, Default)]
pub(crate) struct RemoteConnection {
    pub(crate) node_id: String,
    pub(crate) channels: HashMap<String, Option<PresenceMember>>,
}

/// A local connection with its channels and, per channel, its presence member
pub(crate) type LocalSubscriptions = (Arc<Connection>, Vec<(String, Option<PresenceMember>)>);

#[derive(Default)]
pub(crate) struct NamespaceState {
    pub(crate) connections: HashMap<SocketId, Arc<Connection>>,
    channels: HashMap<String, LocalChannel>,
    pub(crate) users: HashMap<String, HashSet<SocketId>>,
    pub(crate) remote: HashMap<String, RemoteConnection>,
    /// Set once the namespace has been torn down; late arrivals must retry
    pub(crate) retired: bool,
}

impl NamespaceState {
    pub(crate) fn membership(&mut self) -> Membership<'_> {
        Membership { state: self }
    }

    /// Local plus known remote connections
    pub(crate) fn total_connections(&self) -> usize {
        self.connections.len() + self.remote.len()
    }

    pub(crate) fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub(crate) fn channel_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self.channels.keys().cloned().collect();
        for remote in self.remote.values() {
            names.extend(remote.channels.keys().cloned());
        }
        names
    }

    pub(crate) fn add_user_connection(&mut self, user_id: &str, socket_id: &SocketId) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(socket_id.clone());
    }

    pub(crate) fn remove_user_connection(&mut self, user_id: &str, socket_id: &SocketId) {
        if let Some(sockets) = self.users.get_mut(user_id) {
            sockets.remove(socket_id);
            if sockets.is_empty() {
                self.users.remove(user_id);
            }
        }
    }

    pub(crate) fn user_connections(&self, user_id: &str) -> Vec<Arc<Connection>> {
        self.users
            .get(user_id)
            .map(|sockets| {
                sockets
                    .iter()
                    .filter_map(|id| self.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Channels and presence members of every local connection
    pub(crate) fn local_subscriptions(&self) -> Vec<LocalSubscriptions> {
        self.connections
            .values()
            .map(|conn| {
                let channels = conn
                    .subscribed_channels()
                    .into_iter()
                    .map(|channel| {
                        let member = conn.presence_member(&channel);
                        (channel, member)
                    })
                    .collect();
                (conn.clone(), channels)
            })
            .collect()
    }

    // === Remote view ===

    pub(crate) fn remote_connection_new(&mut self, node_id: &str, connection_id: &str) {
        self.remote
            .entry(connection_id.to_string())
            .or_default()
            .node_id = node_id.to_string();
    }

    pub(crate) fn remote_subscribe(
        &mut self,
        node_id: &str,
        connection_id: &str,
        channel: &str,
        member: Option<PresenceMember>,
    ) {
        let remote = self.remote.entry(connection_id.to_string()).or_default();
        remote.node_id = node_id.to_string();
        remote.channels.insert(channel.to_string(), member);
    }

    pub(crate) fn remote_unsubscribe(&mut self, connection_id: &str, channel: &str) {
        if let Some(remote) = self.remote.get_mut(connection_id) {
            remote.channels.remove(channel);
        }
    }

    pub(crate) fn remote_evict(&mut self, connection_id: &str) {
        self.remote.remove(connection_id);
    }

    /// Drop everything learned from `node_id`; returns how many connections went
    pub(crate) fn remote_forget_node(&mut self, node_id: &str) -> usize {
        let before = self.remote.len();
        self.remote.retain(|_, remote| remote.node_id != node_id);
        before - self.remote.len()
    }
}

/// Channel membership operations available to channel managers
pub struct Membership<'a> {
    state: &'a mut NamespaceState,
}

impl Membership<'_> {
    /// Add `conn` to `channel`, returning the local member count
    pub fn add_to_channel(
        &mut self,
        conn: &Connection,
        channel: &str,
        member: Option<PresenceMember>,
    ) -> usize {
        let entry = self.state.channels.entry(channel.to_string()).or_default();
        entry.members.insert(conn.id().clone());

        if let Some(member) = member {
            entry
                .presence
                .entry(member.user_id.clone())
                .or_insert_with(|| PresenceSlot {
                    info: member.user_info.clone(),
                    sockets: HashSet::new(),
                })
                .sockets
                .insert(conn.id().clone());
            conn.set_presence_member(channel, member);
        }

        conn.mark_subscribed(channel);
        entry.members.len()
    }

    /// Remove `conn` from `channel`, returning the local members left
    ///
    /// The channel entry is deleted once its last member leaves.
    pub fn remove_from_channel(&mut self, conn: &Connection, channel: &str) -> usize {
        conn.mark_unsubscribed(channel);
        let member = conn.remove_presence_member(channel);

        let Some(entry) = self.state.channels.get_mut(channel) else {
            return 0;
        };
        entry.members.remove(conn.id());

        if let Some(member) = member {
            if let Some(slot) = entry.presence.get_mut(&member.user_id) {
                slot.sockets.remove(conn.id());
                if slot.sockets.is_empty() {
                    entry.presence.remove(&member.user_id);
                }
            }
        }

        let remaining = entry.members.len();
        if remaining == 0 {
            self.state.channels.remove(channel);
        }
        remaining
    }

    pub fn remove_from_channels(&mut self, conn: &Connection, channels: &[String]) {
        for channel in channels {
            self.remove_from_channel(conn, channel);
        }
    }

    pub fn is_member(&self, socket_id: &SocketId, channel: &str) -> bool {
        self.state
            .channels
            .get(channel)
            .is_some_and(|entry| entry.members.contains(socket_id))
    }

    pub fn local_connections_count(&self, channel: &str) -> usize {
        self.state
            .channels
            .get(channel)
            .map_or(0, |entry| entry.members.len())
    }

    /// Members on this node plus those known on other nodes
    pub fn channel_connections_count(&self, channel: &str) -> usize {
        let remote = self
            .state
            .remote
            .values()
            .filter(|remote| remote.channels.contains_key(channel))
            .count();
        self.local_connections_count(channel) + remote
    }

    /// Presence members by user id; local info wins over remote
    pub fn presence_members(&self, channel: &str) -> BTreeMap<String, Value> {
        let mut members: BTreeMap<String, Value> = self
            .state
            .channels
            .get(channel)
            .map(|entry| {
                entry
                    .presence
                    .iter()
                    .map(|(user_id, slot)| (user_id.clone(), slot.info.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for remote in self.state.remote.values() {
            if let Some(Some(member)) = remote.channels.get(channel) {
                members
                    .entry(member.user_id.clone())
                    .or_insert_with(|| member.user_info.clone());
            }
        }
        members
    }

    pub fn presence_members_count(&self, channel: &str) -> usize {
        self.presence_members(channel).len()
    }

    /// Whether any local or remote connection holds `user_id` in `channel`
    pub fn has_presence_user(&self, channel: &str, user_id: &str) -> bool {
        let local = self
            .state
            .channels
            .get(channel)
            .is_some_and(|entry| entry.presence.contains_key(user_id));
        local
            || self.state.remote.values().any(|remote| {
                matches!(remote.channels.get(channel), Some(Some(member)) if member.user_id == user_id)
            })
    }

    /// Local members of `channel`, optionally leaving one out
    pub fn recipients(&self, channel: &str, except: Option<&str>) -> Vec<Arc<Connection>> {
        let Some(entry) = self.state.channels.get(channel) else {
            return Vec::new();
        };
        entry
            .members
            .iter()
            .filter(|id| except != Some(id.as_str()))
            .filter_map(|id| self.state.connections.get(id).cloned())
            .collect()
    }
}
