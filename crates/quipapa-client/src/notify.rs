//! Local-notification dedup gate.
//!
//! The gate is a decision point plus the platform side effect; the change
//! tracking that feeds its `changed` input is owned by the conversation
//! reconciler, and the gate is called on every snapshot delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use quipapa_backend::Notifier;
use quipapa_shared::UserId;

pub struct DedupGate {
    notifier: Arc<dyn Notifier>,
    local_uid: UserId,
    enabled: Arc<AtomicBool>,
}

impl DedupGate {
    pub fn new(notifier: Arc<dyn Notifier>, local_uid: UserId, enabled: Arc<AtomicBool>) -> Self {
        Self {
            notifier,
            local_uid,
            enabled,
        }
    }

    /// Fire iff the summary text is non-empty, actually changed since the
    /// last delivery, and is not an echo of the local user's own write.
    /// A summary with no recorded sender counts as remote.
    pub fn should_fire(text: &str, sender: Option<&UserId>, local: &UserId, changed: bool) -> bool {
        changed && !text.is_empty() && sender.map_or(true, |uid| uid != local)
    }

    /// Apply the decision and schedule the notification. Platform failures
    /// are logged and swallowed; they must never break a reconciliation
    /// pass.
    pub async fn observe(&self, title: &str, text: &str, sender: Option<&UserId>, changed: bool) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        if !Self::should_fire(text, sender, &self.local_uid, changed) {
            return;
        }
        if let Err(error) = self.notifier.schedule(title, text).await {
            warn!(error = %error, "Failed to schedule local notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fires_for_the_local_users_own_write() {
        let local = UserId::from("u1");
        for text in ["oi", "tudo bem?", "x"] {
            assert!(!DedupGate::should_fire(text, Some(&local), &local, true));
        }
    }

    #[test]
    fn never_fires_without_a_change() {
        let local = UserId::from("u1");
        let remote = UserId::from("u2");
        assert!(!DedupGate::should_fire("oi", Some(&remote), &local, false));
    }

    #[test]
    fn never_fires_for_empty_text() {
        let local = UserId::from("u1");
        let remote = UserId::from("u2");
        assert!(!DedupGate::should_fire("", Some(&remote), &local, true));
    }

    #[test]
    fn fires_for_a_changed_remote_summary() {
        let local = UserId::from("u1");
        let remote = UserId::from("u2");
        assert!(DedupGate::should_fire("oi", Some(&remote), &local, true));
        // Legacy summaries without a recorded sender count as remote.
        assert!(DedupGate::should_fire("oi", None, &local, true));
    }
}
