//! Individual WebSocket connection
//!
//! Owns the socket id, the outbound queue, and the connection's timers. All
//! sends are non-blocking so they can run while the namespace lock is held.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use beacon_common::ConnectionConfig;
use beacon_core::{DomainError, PresenceMember, SocketId, User};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::timer::TimerHandle;
use crate::protocol::ServerMessage;

/// Item on a connection's outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

/// A single client connection
pub struct Connection {
    id: SocketId,
    namespace: String,
    sender: mpsc::Sender<Frame>,
    closed: AtomicBool,

    idle_timeout: Duration,
    close_grace: Duration,
    idle_deadline: Mutex<Instant>,
    idle_watchdog: Mutex<Option<TimerHandle>>,
    auth_deadline: Mutex<Option<TimerHandle>>,

    subscribed_channels: RwLock<HashSet<String>>,
    presence: RwLock<HashMap<String, PresenceMember>>,
    user: RwLock<Option<User>>,
    client_event_limiter: OnceLock<DefaultDirectRateLimiter>,

    created_at: Instant,
}

impl Connection {
    /// Create a connection around an existing outbound queue
    pub fn new(
        id: SocketId,
        namespace: impl Into<String>,
        sender: mpsc::Sender<Frame>,
        config: &ConnectionConfig,
    ) -> Arc<Self> {
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
        Arc::new(Self {
            id,
            namespace: namespace.into(),
            sender,
            closed: AtomicBool::new(false),
            idle_timeout,
            close_grace: Duration::from_millis(config.close_grace_ms),
            idle_deadline: Mutex::new(Instant::now() + idle_timeout),
            idle_watchdog: Mutex::new(None),
            auth_deadline: Mutex::new(None),
            subscribed_channels: RwLock::new(HashSet::new()),
            presence: RwLock::new(HashMap::new()),
            user: RwLock::new(None),
            client_event_limiter: OnceLock::new(),
            created_at: Instant::now(),
        })
    }

    /// Create a connection with a fresh socket id and its queue receiver
    pub fn open(
        namespace: impl Into<String>,
        config: &ConnectionConfig,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        (Self::new(SocketId::generate(), namespace, tx, config), rx)
    }

    pub fn id(&self) -> &SocketId {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    // === Sending ===

    /// Queue a raw text frame. Failures are logged and reported as `false`.
    pub fn send_text(&self, text: String) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.sender.try_send(Frame::Text(text)) {
            Ok(()) => {
                self.touch();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(socket_id = %self.id, "Outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(socket_id = %self.id, "Send on a finished connection");
                false
            }
        }
    }

    /// Serialize and queue a message
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!(socket_id = %self.id, error = %e, "Failed to serialize message");
                false
            }
        }
    }

    /// Queue a `pusher:error` frame; the connection stays open
    pub fn send_error(&self, err: &DomainError, channel: Option<&str>) -> bool {
        self.send_message(&ServerMessage::domain_error(err, channel))
    }

    /// Queue a `pusher:error` frame, then close with the error's code
    pub fn send_error_and_close(&self, err: &DomainError) {
        self.reject(err, None);
    }

    /// Report a protocol error, closing the connection when the error demands it
    pub fn reject(&self, err: &DomainError, channel: Option<&str>) {
        self.send_error(err, channel);
        if err.closes_connection() {
            self.close(Some(err.code()), err.to_string());
        }
    }

    /// Close the connection after the close grace delay
    ///
    /// Frames queued before the call are flushed first. Only the first call
    /// has any effect.
    pub fn close(&self, code: Option<u16>, reason: impl Into<String>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.clear_timers();

        let frame = Frame::Close {
            code,
            reason: reason.into(),
        };
        let sender = self.sender.clone();
        let grace = self.close_grace;
        let socket_id = self.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if sender.send(frame).await.is_err() {
                tracing::trace!(socket_id = %socket_id, "Connection already gone at close");
            }
        });

        tracing::debug!(socket_id = %self.id, code = ?code, "Connection closing");
    }

    // === Timers ===

    /// Push the idle deadline forward
    pub fn touch(&self) {
        *self.idle_deadline.lock() = Instant::now() + self.idle_timeout;
    }

    /// Start closing the connection once it goes idle
    pub fn start_idle_watchdog(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        *self.idle_watchdog.lock() = Some(TimerHandle::spawn(Self::watch_idle(weak)));
    }

    async fn watch_idle(conn: Weak<Self>) {
        loop {
            let Some(deadline) = conn.upgrade().map(|c| *c.idle_deadline.lock()) else {
                return;
            };
            tokio::time::sleep_until(deadline).await;

            let Some(conn) = conn.upgrade() else {
                return;
            };
            if *conn.idle_deadline.lock() <= Instant::now() {
                tracing::info!(socket_id = %conn.id, "Connection idle, closing");
                conn.close(None, "Idle timeout");
                return;
            }
        }
    }

    /// Require `pusher:signin` within `timeout`
    pub fn arm_auth_deadline(self: &Arc<Self>, timeout: Duration) {
        let weak = Arc::downgrade(self);
        let timer = TimerHandle::after(timeout, move || async move {
            if let Some(conn) = weak.upgrade() {
                tracing::info!(socket_id = %conn.id, "User authentication timed out");
                conn.send_error_and_close(&DomainError::AuthenticationTimeout);
            }
        });
        *self.auth_deadline.lock() = Some(timer);
    }

    /// Whether a signin is still expected
    pub fn has_pending_auth(&self) -> bool {
        self.auth_deadline
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn clear_auth_deadline(&self) {
        self.auth_deadline.lock().take();
    }

    pub fn clear_timers(&self) {
        self.clear_auth_deadline();
        self.idle_watchdog.lock().take();
    }

    // === Rate limiting ===

    /// Limit client events to `per_second`; only the first call applies
    pub fn limit_client_events(&self, per_second: u32) {
        if let Some(per_second) = NonZeroU32::new(per_second) {
            let _ = self
                .client_event_limiter
                .set(RateLimiter::direct(Quota::per_second(per_second)));
        }
    }

    /// Consume one client event from the rate budget
    pub fn allow_client_event(&self) -> bool {
        self.client_event_limiter
            .get()
            .is_none_or(|limiter| limiter.check().is_ok())
    }

    // === Channels ===

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed_channels.read().iter().cloned().collect()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed_channels.read().contains(channel)
    }

    pub(crate) fn mark_subscribed(&self, channel: &str) {
        self.subscribed_channels.write().insert(channel.to_string());
    }

    pub(crate) fn mark_unsubscribed(&self, channel: &str) {
        self.subscribed_channels.write().remove(channel);
    }

    pub fn presence_member(&self, channel: &str) -> Option<PresenceMember> {
        self.presence.read().get(channel).cloned()
    }

    pub(crate) fn set_presence_member(&self, channel: &str, member: PresenceMember) {
        self.presence.write().insert(channel.to_string(), member);
    }

    pub(crate) fn remove_presence_member(&self, channel: &str) -> Option<PresenceMember> {
        self.presence.write().remove(channel)
    }

    // === User ===

    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user.read().as_ref().map(|user| user.id.clone())
    }

    pub(crate) fn set_user(&self, user: User) {
        *self.user.write() = Some(user);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("closed", &self.is_closed())
            .field("channels", &self.subscribed_channels.read().len())
            .finish()
    }
}
