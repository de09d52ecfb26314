//! Domain errors - protocol rejections and the codes clients receive for them

use thiserror::Error;

/// Domain layer errors
///
/// The `Display` text of protocol variants is the exact message sent to the
/// client in `pusher:error` or `pusher:subscription_error` frames.
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // App Errors
    // =========================================================================
    #[error("App not found.")]
    AppNotFound,

    #[error("The app is not enabled.")]
    AppDisabled,

    #[error("The current concurrent connections quota has been reached.")]
    ConnectionQuotaReached,

    // =========================================================================
    // Subscription Errors
    // =========================================================================
    #[error("The channel name is longer than the allowed {max} characters.")]
    ChannelNameTooLong { max: usize },

    #[error("The connection is unauthorized.")]
    Unauthorized,

    #[error("The maximum members per presence channel limit was reached")]
    PresenceMembersLimit,

    #[error("The maximum size for a channel member is {max_kb} KB.")]
    PresenceMemberTooLarge { max_kb: f64 },

    // =========================================================================
    // Client Event Errors
    // =========================================================================
    #[error("The app does not have client messaging enabled.")]
    ClientMessagesDisabled,

    #[error("Event name is too long. Maximum allowed size is {max}.")]
    EventNameTooLong { max: usize },

    #[error("The event data should be less than {max_kb} KB.")]
    EventPayloadTooLarge { max_kb: f64 },

    #[error("The rate limit for sending client events exceeded the quota.")]
    ClientEventRateLimited,

    // =========================================================================
    // User Authentication Errors
    // =========================================================================
    #[error("Connection not authorized.")]
    SigninUnauthorized,

    #[error("The returned user data must contain the \"id\" field.")]
    SigninMissingId,

    #[error("Connection not authorized within timeout.")]
    AuthenticationTimeout,

    #[error("You got disconnected by the app.")]
    TerminatedByApp,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Pusher error code carried in the error frame, also used as close code
    pub fn code(&self) -> u16 {
        match self {
            Self::AppDisabled => 4003,
            Self::PresenceMembersLimit => 4004,
            Self::ConnectionQuotaReached => 4100,
            Self::PresenceMemberTooLarge { .. }
            | Self::ClientMessagesDisabled
            | Self::EventNameTooLong { .. }
            | Self::EventPayloadTooLarge { .. }
            | Self::ClientEventRateLimited => 4301,
            Self::AppNotFound
            | Self::ChannelNameTooLong { .. }
            | Self::Unauthorized
            | Self::SigninUnauthorized
            | Self::SigninMissingId
            | Self::AuthenticationTimeout
            | Self::TerminatedByApp => 4009,
            Self::CacheError(_) | Self::InternalError(_) => 4200,
        }
    }

    /// `type` field of a `pusher:subscription_error`
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Unauthorized => "AuthError",
            Self::ChannelNameTooLong { .. }
            | Self::PresenceMembersLimit
            | Self::PresenceMemberTooLarge { .. } => "LimitReached",
            Self::ClientMessagesDisabled
            | Self::EventNameTooLong { .. }
            | Self::EventPayloadTooLarge { .. }
            | Self::ClientEventRateLimited => "ClientEventRejected",
            _ => "ServerError",
        }
    }

    /// `status` field of a `pusher:subscription_error`
    pub fn status(&self) -> u16 {
        if self.is_auth_error() {
            401
        } else {
            self.code()
        }
    }

    /// Check if this is a channel authorization failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Check if this is a limit violation
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            Self::ChannelNameTooLong { .. }
                | Self::PresenceMembersLimit
                | Self::PresenceMemberTooLarge { .. }
                | Self::EventNameTooLong { .. }
                | Self::EventPayloadTooLarge { .. }
                | Self::ClientEventRateLimited
                | Self::ConnectionQuotaReached
        )
    }

    /// Check if the connection must be closed after reporting this error
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::AppNotFound
                | Self::AppDisabled
                | Self::ConnectionQuotaReached
                | Self::ClientMessagesDisabled
                | Self::EventNameTooLong { .. }
                | Self::EventPayloadTooLarge { .. }
                | Self::ClientEventRateLimited
                | Self::SigninUnauthorized
                | Self::SigninMissingId
                | Self::AuthenticationTimeout
                | Self::TerminatedByApp
        )
    }
}
