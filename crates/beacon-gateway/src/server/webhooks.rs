//! Webhook collaborator used by the server binary
//!
//! Delivery lives outside the gateway. This sender records every
//! notification that at least one of the app's webhooks asked for.

use async_trait::async_trait;
use beacon_core::{App, WebhookNotification, WebhookSender};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingWebhookSender;

impl LoggingWebhookSender {
    /// Number of the app's webhooks that want `notification`
    #[must_use]
    pub fn matching(app: &App, notification: &WebhookNotification) -> usize {
        app.webhooks()
            .iter()
            .filter(|hook| hook.triggers_on(notification.event(), notification.channel()))
            .count()
    }
}

#[async_trait]
impl WebhookSender for LoggingWebhookSender {
    async fn send(&self, app: &App, notification: WebhookNotification) {
        let webhooks = Self::matching(app, &notification);
        if webhooks == 0 {
            return;
        }
        tracing::info!(
            namespace = %app.id,
            channel = %notification.channel(),
            event = ?notification.event(),
            webhooks,
            "Webhook notification due"
        );
    }
}
