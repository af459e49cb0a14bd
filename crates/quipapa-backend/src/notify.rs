//! Platform notification service contract.

use async_trait::async_trait;

use quipapa_shared::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Ask the platform for notification permission. `Ok(false)` means the
    /// user declined; callers treat that as "do not register, do not fire".
    async fn request_permission(&self) -> Result<bool, NotifyError>;

    /// Schedule an immediate local notification.
    async fn schedule(&self, title: &str, body: &str) -> Result<(), NotifyError>;

    /// Register a device push token with the platform service.
    async fn register_push_token(&self, token: &str) -> Result<(), NotifyError>;
}
