//! Connection registry
//!
//! The registry is the only writer of namespace state. Every membership
//! check and the mutation that depends on it happen under one namespace
//! lock; gossip, cache and webhook calls run after the lock is released.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use beacon_cache::LocalCacheStore;
use beacon_common::{AppConfig, Token};
use beacon_core::{
    data_to_kilobytes, is_cache_channel, user_id_from_value, Announcement, AnnouncementEvent, App,
    AppRepository, CacheStore, DomainError, NoopWebhookSender, PresenceMember, SocketId, User,
    WebhookNotification, WebhookSender,
};
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;

use super::namespace::{Namespace, NamespaceState};
use super::{Connection, RegistryError};
use crate::channels::{ChannelManager, JoinRequest};
use crate::gossip::{AnnouncementHandler, Gossiper};
use crate::protocol::{PresenceData, ServerMessage, SigninData, SubscribeData};

/// Registry tunables
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Advertised in `pusher:connection_established`
    pub activity_timeout_secs: u64,
    /// How long the last event of a cache channel is kept
    pub cache_ttl_seconds: Option<u64>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            activity_timeout_secs: 30,
            cache_ttl_seconds: Some(1800),
        }
    }
}

impl RegistrySettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            activity_timeout_secs: config.connection.activity_timeout_secs,
            cache_ttl_seconds: Some(config.cache.ttl_seconds).filter(|ttl| *ttl > 0),
        }
    }
}

/// Builder for [`ConnectionRegistry`]
pub struct RegistryBuilder {
    apps: Arc<dyn AppRepository>,
    gossiper: Arc<dyn Gossiper>,
    cache: Option<Arc<dyn CacheStore>>,
    webhooks: Arc<dyn WebhookSender>,
    settings: RegistrySettings,
}

impl RegistryBuilder {
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn webhooks(mut self, webhooks: Arc<dyn WebhookSender>) -> Self {
        self.webhooks = webhooks;
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: RegistrySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the registry. Without an explicit cache a local store is
    /// created, which requires a Tokio runtime.
    #[must_use]
    pub fn build(self) -> Arc<ConnectionRegistry> {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LocalCacheStore::new()));
        Arc::new_cyclic(|this| ConnectionRegistry {
            this: this.clone(),
            apps: self.apps,
            gossiper: self.gossiper,
            cache,
            webhooks: self.webhooks,
            settings: self.settings,
            namespaces: DashMap::new(),
        })
    }
}

/// Outcome of trying to place a connection into a namespace
enum Admission {
    Admitted,
    Retired,
    Refused(DomainError),
    Duplicate,
}

/// Authoritative record of the connections on this node
pub struct ConnectionRegistry {
    this: Weak<Self>,
    apps: Arc<dyn AppRepository>,
    gossiper: Arc<dyn Gossiper>,
    cache: Arc<dyn CacheStore>,
    webhooks: Arc<dyn WebhookSender>,
    settings: RegistrySettings,
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("node_id", &self.gossiper.node_id())
            .field("namespaces", &self.namespaces.len())
            .finish()
    }
}

impl ConnectionRegistry {
    #[must_use]
    pub fn builder(apps: Arc<dyn AppRepository>, gossiper: Arc<dyn Gossiper>) -> RegistryBuilder {
        RegistryBuilder {
            apps,
            gossiper,
            cache: None,
            webhooks: Arc::new(NoopWebhookSender),
            settings: RegistrySettings::default(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        self.gossiper.node_id()
    }

    #[must_use]
    pub fn apps(&self) -> &Arc<dyn AppRepository> {
        &self.apps
    }

    fn namespace(&self, namespace: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(namespace).map(|entry| entry.value().clone())
    }

    fn is_current(&self, id: &str, namespace: &Arc<Namespace>) -> bool {
        self.namespaces
            .get(id)
            .is_some_and(|held| Arc::ptr_eq(held.value(), namespace))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a freshly opened connection
    ///
    /// Rejections are reported to the client and the connection is closed
    /// before the error is returned.
    pub async fn new_connection(&self, conn: &Arc<Connection>) -> Result<(), RegistryError> {
        let app = match self.apps.get_by_id(conn.namespace()).await {
            Ok(Some(app)) => app,
            Ok(None) => return Err(Self::reject(conn, DomainError::AppNotFound)),
            Err(e) => {
                tracing::error!(namespace = %conn.namespace(), error = %e, "App lookup failed");
                return Err(Self::reject(conn, e));
            }
        };
        if !app.enabled {
            return Err(Self::reject(conn, DomainError::AppDisabled));
        }

        loop {
            let namespace = self.open_namespace(&app).await;
            let admission = {
                let mut state = namespace.state.lock();
                self.admit(&mut state, &app, conn)
            };

            match admission {
                Admission::Retired => {
                    let released = namespace.released.notified();
                    if self.is_current(&app.id, &namespace) {
                        released.await;
                    }
                }
                Admission::Admitted => {
                    tracing::info!(
                        socket_id = %conn.id(),
                        namespace = %app.id,
                        "Connection registered"
                    );
                    self.gossiper
                        .announce_new_connection(&app.id, conn.id().as_str())
                        .await;
                    return Ok(());
                }
                Admission::Duplicate => {
                    tracing::warn!(socket_id = %conn.id(), "Duplicate connection id rejected");
                    return Err(RegistryError::DuplicateConnection(conn.id().clone()));
                }
                Admission::Refused(err) => {
                    let err = Self::reject(conn, err);
                    self.release_if_empty(&app.id, &namespace).await;
                    return Err(err);
                }
            }
        }
    }

    fn reject(conn: &Connection, err: DomainError) -> RegistryError {
        tracing::info!(socket_id = %conn.id(), error = %err, "Connection rejected");
        conn.send_error_and_close(&err);
        RegistryError::Rejected(err)
    }

    /// Get or create the namespace, subscribing to its gossip topic first
    async fn open_namespace(&self, app: &Arc<App>) -> Arc<Namespace> {
        let namespace = match self.namespace(&app.id) {
            Some(namespace) => {
                namespace.refresh_app(app.clone());
                namespace
            }
            None => self
                .namespaces
                .entry(app.id.clone())
                .or_insert_with(|| Arc::new(Namespace::new(app.clone())))
                .value()
                .clone(),
        };

        namespace
            .ready
            .get_or_init(|| async {
                if let Err(e) = self
                    .gossiper
                    .subscribe_to_namespace(&app.id, self.announcement_handler())
                    .await
                {
                    tracing::warn!(namespace = %app.id, error = %e, "Gossip subscribe failed");
                }
                self.gossiper.announce_app_new(&app.id, &app.id, &app.key).await;
                tracing::debug!(namespace = %app.id, "Namespace opened");
            })
            .await;

        namespace
    }

    fn admit(&self, state: &mut NamespaceState, app: &App, conn: &Arc<Connection>) -> Admission {
        if state.retired {
            return Admission::Retired;
        }
        if let Some(quota) = app.connection_quota() {
            if state.total_connections() >= quota {
                return Admission::Refused(DomainError::ConnectionQuotaReached);
            }
        }
        if state.connections.contains_key(conn.id()) {
            return Admission::Duplicate;
        }

        state.connections.insert(conn.id().clone(), conn.clone());

        if let Some(per_second) = app.client_events_per_second() {
            conn.limit_client_events(per_second);
        }
        conn.start_idle_watchdog();
        conn.send_message(&ServerMessage::connection_established(
            conn.id().as_str(),
            self.settings.activity_timeout_secs,
        ));
        if app.enable_user_authentication {
            conn.arm_auth_deadline(Duration::from_millis(app.user_authentication_timeout_ms));
        }
        Admission::Admitted
    }

    /// Unregister a connection and release everything it held
    ///
    /// `on_empty_namespace` runs if this was the namespace's last
    /// connection. Calling this again for the same connection does nothing.
    pub async fn remove_connection(
        &self,
        conn: &Arc<Connection>,
        on_empty_namespace: Option<Box<dyn FnOnce() + Send>>,
    ) {
        conn.clear_timers();

        let Some(namespace) = self.namespace(conn.namespace()) else {
            return;
        };
        let registered = namespace
            .state
            .lock()
            .connections
            .get(conn.id())
            .is_some_and(|held| Arc::ptr_eq(held, conn));
        if !registered {
            return;
        }

        for channel in conn.subscribed_channels() {
            self.leave_channel(conn, &channel).await;
        }

        let (removed, empty) = {
            let mut state = namespace.state.lock();
            if let Some(user_id) = conn.user_id() {
                state.remove_user_connection(&user_id, conn.id());
            }
            let removed = state.connections.remove(conn.id()).is_some();
            (removed, state.connections.is_empty())
        };

        if removed {
            tracing::info!(socket_id = %conn.id(), namespace = %conn.namespace(), "Connection removed");
            self.gossiper
                .announce_eviction(conn.namespace(), conn.id().as_str())
                .await;
        }

        if empty && self.release_if_empty(conn.namespace(), &namespace).await {
            if let Some(callback) = on_empty_namespace {
                callback();
            }
        }
    }

    /// Tear a namespace down once it has no local connections
    async fn release_if_empty(&self, id: &str, namespace: &Arc<Namespace>) -> bool {
        {
            let mut state = namespace.state.lock();
            if state.retired || !state.connections.is_empty() {
                return false;
            }
            state.retired = true;
        }

        self.gossiper.announce_app_forget(id).await;
        if let Err(e) = self.gossiper.unsubscribe_from_namespace(id).await {
            tracing::warn!(namespace = %id, error = %e, "Gossip unsubscribe failed");
        }
        self.namespaces
            .remove_if(id, |_, held| Arc::ptr_eq(held, namespace));
        namespace.released.notify_waiters();

        tracing::debug!(namespace = %id, "Namespace released");
        true
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Handle `pusher:subscribe`
    pub async fn subscribe_to_channel(&self, conn: &Arc<Connection>, data: &SubscribeData) {
        if conn.is_closed() {
            return;
        }
        let Some(namespace) = self.namespace(conn.namespace()) else {
            return;
        };
        let app = namespace.app();
        let channel = data.channel.as_str();

        if channel.len() > app.limits.max_channel_name_length {
            let err = DomainError::ChannelNameTooLong {
                max: app.limits.max_channel_name_length,
            };
            conn.send_message(&ServerMessage::subscription_error(channel, &err));
            return;
        }

        let manager = ChannelManager::for_channel(channel, app.clone());
        let channel_data = data.channel_data();
        let request = JoinRequest {
            channel,
            auth: data.auth.as_deref(),
            channel_data: channel_data.as_deref(),
        };

        let joined = {
            let mut state = namespace.state.lock();
            if !state.connections.contains_key(conn.id()) {
                return;
            }
            let mut membership = state.membership();
            manager.join(&mut membership, conn, &request).map(|outcome| {
                match &outcome.member {
                    Some(member) => {
                        if outcome.new_member {
                            let added = ServerMessage::member_added(channel, member);
                            deliver(
                                &membership.recipients(channel, Some(conn.id().as_str())),
                                &added,
                            );
                        }
                        let presence =
                            PresenceData::from_members(membership.presence_members(channel));
                        conn.send_message(&ServerMessage::presence_subscription_succeeded(
                            channel, &presence,
                        ));
                    }
                    None => {
                        conn.send_message(&ServerMessage::subscription_succeeded(channel));
                    }
                }
                outcome
            })
        };

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(socket_id = %conn.id(), channel = %channel, error = %err, "Subscription refused");
                conn.send_message(&ServerMessage::subscription_error(channel, &err));
                return;
            }
        };
        if outcome.rejoined {
            tracing::debug!(socket_id = %conn.id(), channel = %channel, "Already subscribed");
            return;
        }
        tracing::debug!(socket_id = %conn.id(), channel = %channel, kind = %manager.kind(), "Subscribed");

        if outcome.new_member {
            if let Some(member) = &outcome.member {
                self.gossiper
                    .announce_channel_broadcast(
                        &app.id,
                        channel,
                        &ServerMessage::member_added(channel, member),
                        Some(conn.id().as_str()),
                    )
                    .await;
            }
        }

        if is_cache_channel(channel) {
            self.send_cached_event(&app, conn, channel).await;
        }

        let announced = outcome.member.clone().map(|member| PresenceMember {
            socket_id: Some(conn.id().to_string()),
            ..member
        });
        self.gossiper
            .announce_channel_subscription(&app.id, conn.id().as_str(), channel, announced)
            .await;

        if outcome.connections == 1 && app.has_channel_occupied_webhooks() {
            self.notify(&app, WebhookNotification::ChannelOccupied {
                channel: channel.to_string(),
            })
            .await;
        }
        if let Some(member) = outcome.member.filter(|_| outcome.new_member) {
            if app.has_member_added_webhooks() {
                self.notify(&app, WebhookNotification::MemberAdded {
                    channel: channel.to_string(),
                    user_id: member.user_id,
                })
                .await;
            }
        }
    }

    /// Handle `pusher:unsubscribe`
    ///
    /// Ignored once the connection is closing; its channels are released
    /// when the connection is removed.
    pub async fn unsubscribe_from_channel(&self, conn: &Arc<Connection>, channel: &str) {
        if conn.is_closed() {
            return;
        }
        self.leave_channel(conn, channel).await;
    }

    async fn leave_channel(&self, conn: &Arc<Connection>, channel: &str) {
        let Some(namespace) = self.namespace(conn.namespace()) else {
            return;
        };
        let app = namespace.app();
        let manager = ChannelManager::for_channel(channel, app.clone());

        let (response, departed) = {
            let mut state = namespace.state.lock();
            let mut membership = state.membership();
            let response = manager.leave(&mut membership, conn, channel);
            let departed = response
                .member
                .clone()
                .filter(|member| response.left && !membership.has_presence_user(channel, &member.user_id));
            if let Some(member) = &departed {
                let removed = ServerMessage::member_removed(channel, &member.user_id);
                deliver(&membership.recipients(channel, None), &removed);
            }
            (response, departed)
        };

        if !response.left {
            return;
        }
        tracing::debug!(socket_id = %conn.id(), channel = %channel, "Unsubscribed");

        if let Some(member) = &departed {
            self.gossiper
                .announce_channel_broadcast(
                    &app.id,
                    channel,
                    &ServerMessage::member_removed(channel, &member.user_id),
                    None,
                )
                .await;
        }
        self.gossiper
            .announce_channel_unsubscription(&app.id, conn.id().as_str(), channel)
            .await;

        if response.remaining_connections == 0 && app.has_channel_vacated_webhooks() {
            self.notify(&app, WebhookNotification::ChannelVacated {
                channel: channel.to_string(),
            })
            .await;
        }
        if let Some(member) = departed {
            if app.has_member_removed_webhooks() {
                self.notify(&app, WebhookNotification::MemberRemoved {
                    channel: channel.to_string(),
                    user_id: member.user_id,
                })
                .await;
            }
        }
    }

    fn cache_key(app: &App, channel: &str) -> String {
        format!("app_{}_channel_{}_cache_miss", app.id, channel)
    }

    async fn send_cached_event(&self, app: &App, conn: &Connection, channel: &str) {
        match self.cache.get(&Self::cache_key(app, channel)).await {
            Ok(Some(Value::String(text))) => {
                conn.send_text(text);
            }
            Ok(Some(other)) => {
                conn.send_text(other.to_string());
            }
            Ok(None) => {
                conn.send_message(&ServerMessage::cache_miss(channel));
                if app.has_cache_miss_webhooks() {
                    self.notify(app, WebhookNotification::CacheMiss {
                        channel: channel.to_string(),
                    })
                    .await;
                }
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Cache lookup failed");
            }
        }
    }

    async fn remember_event(&self, app: &App, channel: &str, message: &ServerMessage) {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Failed to encode cached event");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(
                &Self::cache_key(app, channel),
                Value::String(text),
                self.settings.cache_ttl_seconds,
            )
            .await
        {
            tracing::warn!(channel = %channel, error = %e, "Cache write failed");
        }
    }

    async fn notify(&self, app: &App, notification: WebhookNotification) {
        self.webhooks.send(app, notification).await;
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Handle a `client-*` event
    ///
    /// Rejections are reported with `pusher:error` and close the connection
    /// with 4301. Events on channels the sender has not joined are dropped.
    pub async fn handle_client_event(
        &self,
        conn: &Arc<Connection>,
        event: &str,
        channel: &str,
        data: Value,
    ) {
        if conn.is_closed() {
            return;
        }
        let Some(namespace) = self.namespace(conn.namespace()) else {
            return;
        };
        let app = namespace.app();

        if let Err(err) = Self::check_client_event(&app, conn, event, &data) {
            tracing::debug!(socket_id = %conn.id(), event = %event, error = %err, "Client event rejected");
            conn.reject(&err, Some(channel));
            return;
        }

        let message = ServerMessage::channel_event(
            event,
            channel,
            data.clone(),
            conn.presence_member(channel).map(|member| member.user_id),
        );

        let recipients = {
            let mut state = namespace.state.lock();
            let membership = state.membership();
            membership
                .is_member(conn.id(), channel)
                .then(|| membership.recipients(channel, Some(conn.id().as_str())))
        };
        let Some(recipients) = recipients else {
            tracing::debug!(socket_id = %conn.id(), channel = %channel, "Client event from non-member dropped");
            return;
        };

        deliver(&recipients, &message);
        self.gossiper
            .announce_channel_broadcast(&app.id, channel, &message, Some(conn.id().as_str()))
            .await;

        if is_cache_channel(channel) {
            self.remember_event(&app, channel, &message).await;
        }
        if app.has_client_event_webhooks() {
            self.notify(&app, WebhookNotification::ClientEvent {
                channel: channel.to_string(),
                event: event.to_string(),
                data,
                socket_id: conn.id().to_string(),
                user_id: message.user_id.clone(),
            })
            .await;
        }
    }

    fn check_client_event(
        app: &App,
        conn: &Connection,
        event: &str,
        data: &Value,
    ) -> Result<(), DomainError> {
        let limits = &app.limits;
        if !app.enable_client_messages {
            return Err(DomainError::ClientMessagesDisabled);
        }
        if event.len() > limits.max_event_name_length {
            return Err(DomainError::EventNameTooLong {
                max: limits.max_event_name_length,
            });
        }
        if data_to_kilobytes(data) > limits.max_event_payload_in_kb {
            return Err(DomainError::EventPayloadTooLarge {
                max_kb: limits.max_event_payload_in_kb,
            });
        }
        if !conn.allow_client_event() {
            return Err(DomainError::ClientEventRateLimited);
        }
        Ok(())
    }

    /// Handle `pusher:signin`
    ///
    /// `data` is echoed back verbatim on success.
    pub async fn handle_signin(&self, conn: &Arc<Connection>, data: Value) {
        if !conn.has_pending_auth() {
            return;
        }
        let Some(namespace) = self.namespace(conn.namespace()) else {
            return;
        };
        let app = namespace.app();

        let signin: SigninData = match serde_json::from_value(data.clone()) {
            Ok(signin) => signin,
            Err(_) => return conn.send_error_and_close(&DomainError::SigninUnauthorized),
        };

        let token = Token::new(app.key.as_str(), app.secret.as_str());
        let input = format!("{}::user::{}", conn.id(), signin.user_data);
        if !token.verify_auth_string(&input, &signin.auth) {
            tracing::info!(socket_id = %conn.id(), "Signin with an invalid token");
            return conn.send_error_and_close(&DomainError::SigninUnauthorized);
        }

        let user_data = serde_json::from_str::<Value>(&signin.user_data).ok();
        let Some((user_data, user_id)) = user_data.and_then(|user_data| {
            let user_id = user_data.get("id").and_then(user_id_from_value)?;
            Some((user_data, user_id))
        }) else {
            return conn.send_error_and_close(&DomainError::SigninMissingId);
        };

        conn.set_user(User::new(user_id.as_str(), user_data));
        namespace
            .state
            .lock()
            .add_user_connection(&user_id, conn.id());
        conn.clear_auth_deadline();

        tracing::info!(socket_id = %conn.id(), user_id = %user_id, "User signed in");
        conn.send_message(&ServerMessage::signin_success(data));
    }

    /// Deliver `message` to the local members of `channel`
    ///
    /// Returns how many connections accepted it.
    pub fn broadcast_to_channel(
        &self,
        namespace: &str,
        channel: &str,
        message: &ServerMessage,
        except: Option<&str>,
    ) -> usize {
        let Some(namespace) = self.namespace(namespace) else {
            return 0;
        };
        let recipients = namespace.state.lock().membership().recipients(channel, except);
        deliver(&recipients, message)
    }

    /// Publish a server-side event to every node serving `app`
    pub async fn publish_event(
        &self,
        app: &App,
        channels: &[String],
        event: &str,
        data: &Value,
        socket_id: Option<&str>,
    ) {
        for channel in channels {
            let message = ServerMessage::channel_event(event, channel, data.clone(), None);
            let delivered = self.broadcast_to_channel(&app.id, channel, &message, socket_id);
            tracing::debug!(namespace = %app.id, channel = %channel, event = %event, delivered, "Event published");

            self.gossiper
                .announce_channel_broadcast(&app.id, channel, &message, socket_id)
                .await;
            if is_cache_channel(channel) {
                self.remember_event(app, channel, &message).await;
            }
        }
    }

    /// Close every local connection signed in as `user_id`
    pub fn terminate_user_connections(&self, namespace: &str, user_id: &str) -> usize {
        let Some(namespace) = self.namespace(namespace) else {
            return 0;
        };
        let connections = namespace.state.lock().user_connections(user_id);
        for conn in &connections {
            conn.send_error_and_close(&DomainError::TerminatedByApp);
        }
        connections.len()
    }

    // =========================================================================
    // Gossip
    // =========================================================================

    fn announcement_handler(&self) -> AnnouncementHandler {
        let registry = self.this.clone();
        Arc::new(move |announcement| {
            let registry = registry.clone();
            async move {
                if let Some(registry) = registry.upgrade() {
                    registry.handle_announcement(announcement).await;
                }
            }
            .boxed()
        })
    }

    /// Apply an announcement received from another node
    pub async fn handle_announcement(&self, announcement: Announcement) {
        let Some(namespace) = self.namespace(&announcement.namespace) else {
            tracing::debug!(namespace = %announcement.namespace, "Announcement for a closed namespace");
            return;
        };
        let Announcement {
            node_id,
            event,
            payload,
            ..
        } = announcement;
        tracing::trace!(namespace = %namespace.app().id, node_id = %node_id, event = %event, "Announcement received");

        match event {
            AnnouncementEvent::ChannelBroadcast => {
                let (Some(channel), Some(message)) = (payload.channel, payload.message) else {
                    tracing::warn!(node_id = %node_id, "Broadcast without channel or message");
                    return;
                };
                let message: ServerMessage = match serde_json::from_value(message) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(node_id = %node_id, error = %e, "Undecodable broadcast");
                        return;
                    }
                };
                let recipients = namespace
                    .state
                    .lock()
                    .membership()
                    .recipients(&channel, payload.excepting_id.as_deref());
                deliver(&recipients, &message);
            }
            AnnouncementEvent::ConnectionNew => {
                if let Some(connection_id) = payload.connection_id {
                    namespace
                        .state
                        .lock()
                        .remote_connection_new(&node_id, &connection_id);
                }
            }
            AnnouncementEvent::ChannelSubscribe => {
                if let (Some(connection_id), Some(channel)) = (payload.connection_id, payload.channel) {
                    namespace.state.lock().remote_subscribe(
                        &node_id,
                        &connection_id,
                        &channel,
                        payload.member,
                    );
                }
            }
            AnnouncementEvent::ChannelUnsubscribe => {
                if let (Some(connection_id), Some(channel)) = (payload.connection_id, payload.channel) {
                    namespace
                        .state
                        .lock()
                        .remote_unsubscribe(&connection_id, &channel);
                }
            }
            AnnouncementEvent::ConnectionEviction => {
                if let Some(connection_id) = payload.connection_id {
                    namespace.state.lock().remote_evict(&connection_id);
                }
            }
            AnnouncementEvent::AppForget => {
                let forgotten = namespace.state.lock().remote_forget_node(&node_id);
                tracing::debug!(node_id = %node_id, forgotten, "Node left the namespace");
            }
            AnnouncementEvent::AppNew => {
                tracing::debug!(node_id = %node_id, "Node joined the namespace");
                self.replay_local_state(&namespace).await;
            }
            AnnouncementEvent::MessageIncoming => {
                tracing::debug!(node_id = %node_id, event = %event, "Announcement noted");
            }
        }
    }

    /// Re-announce every local connection and subscription for a node
    /// that has just opened the namespace
    async fn replay_local_state(&self, namespace: &Namespace) {
        let app = namespace.app();
        let subscriptions = namespace.state.lock().local_subscriptions();
        tracing::debug!(namespace = %app.id, connections = subscriptions.len(), "Replaying local state");

        for (conn, channels) in subscriptions {
            let socket_id = conn.id().as_str();
            self.gossiper.announce_new_connection(&app.id, socket_id).await;
            for (channel, member) in channels {
                let member = member.map(|member| PresenceMember {
                    socket_id: Some(socket_id.to_string()),
                    ..member
                });
                self.gossiper
                    .announce_channel_subscription(&app.id, socket_id, &channel, member)
                    .await;
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Local and known remote connections of a namespace
    #[must_use]
    pub fn connections_count(&self, namespace: &str) -> usize {
        self.namespace(namespace)
            .map_or(0, |ns| ns.state.lock().total_connections())
    }

    #[must_use]
    pub fn local_connections_count(&self, namespace: &str) -> usize {
        self.namespace(namespace)
            .map_or(0, |ns| ns.state.lock().connections.len())
    }

    /// Local and known remote members of a channel
    #[must_use]
    pub fn channel_connections_count(&self, namespace: &str, channel: &str) -> usize {
        self.namespace(namespace).map_or(0, |ns| {
            ns.state.lock().membership().channel_connections_count(channel)
        })
    }

    /// Presence members of a channel by user id
    #[must_use]
    pub fn channel_members(&self, namespace: &str, channel: &str) -> BTreeMap<String, Value> {
        self.namespace(namespace)
            .map(|ns| ns.state.lock().membership().presence_members(channel))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_in_channel(&self, namespace: &str, socket_id: &SocketId, channel: &str) -> bool {
        self.namespace(namespace)
            .is_some_and(|ns| ns.state.lock().membership().is_member(socket_id, channel))
    }

    /// Whether the channel has at least one local member
    #[must_use]
    pub fn has_channel(&self, namespace: &str, channel: &str) -> bool {
        self.namespace(namespace)
            .is_some_and(|ns| ns.state.lock().has_channel(channel))
    }

    /// Channels with local or known remote members
    #[must_use]
    pub fn channels(&self, namespace: &str) -> HashSet<String> {
        self.namespace(namespace)
            .map(|ns| ns.state.lock().channel_names())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn namespaces_count(&self) -> usize {
        self.namespaces.len()
    }

    #[must_use]
    pub fn user_connections(&self, namespace: &str, user_id: &str) -> Vec<Arc<Connection>> {
        self.namespace(namespace)
            .map(|ns| ns.state.lock().user_connections(user_id))
            .unwrap_or_default()
    }
}

/// Best-effort fanout; a failed send never stops the others
fn deliver(recipients: &[Arc<Connection>], message: &ServerMessage) -> usize {
    if recipients.is_empty() {
        return 0;
    }
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode broadcast");
            return 0;
        }
    };
    recipients
        .iter()
        .filter(|conn| conn.send_text(text.clone()))
        .count()
}
