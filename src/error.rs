use thiserror::Error;

/// Credential Store failures. Neither variant removes the subscriber;
/// a refresh failure skips the subscriber for the current cycle, an
/// expired credential without a refresh token leaves it registered but
/// inert until re-authorization.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("access token expired and no refresh token is available")]
    Expired,
}

/// Mailbox Scanner failures. Caught per subscriber so one broken
/// mailbox never stops the cycle for everyone else.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("mailbox transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mailbox api error: {0}")]
    Api(String),
}

/// Notification Dispatcher failures. Non-fatal to producers; a missed
/// notification is retried on the next poll cycle, a missed deletion is
/// dropped.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("notification channel is closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error("telegram api error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("chat {0} is already registered to another account")]
    DestinationInUse(i64),
}
