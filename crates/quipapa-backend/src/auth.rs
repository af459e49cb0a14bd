//! Authentication provider contract.

use async_trait::async_trait;
use serde::Serialize;

use quipapa_shared::{AuthError, UserId};

/// An authenticated session as reported by the provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: UserId,
    pub email: String,
}

/// Invoked on every session transition; `None` means signed out.
pub type SessionCallback = Box<dyn Fn(Option<Session>) + Send + Sync>;

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Currently signed-in session, if any.
    fn current_session(&self) -> Option<Session>;

    /// Register an observer for session transitions. Observers live for the
    /// provider's lifetime.
    fn on_session_change(&self, callback: SessionCallback);
}
