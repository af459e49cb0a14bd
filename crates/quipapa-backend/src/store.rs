//! Document-database and live-query contracts.
//!
//! The backend delivers, for every watched query, a full current result set
//! on each relevant mutation; there are no incremental patches. Consumers
//! own an explicit [`Subscription`] handle scoped to the lifetime of the
//! screen that opened it; leaking one past that lifetime is a defect.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use quipapa_shared::documents::field;
use quipapa_shared::{ConversationId, RawDocument, StoreError, UserId};

/// Marker value accepted by [`DocumentStore::append`]: the backend replaces
/// it with its own monotonic clock when the document is committed.
pub const SERVER_TIMESTAMP_KEY: &str = "__serverTimestamp";

pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: true })
}

/// The query shapes the client actually issues.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Documents whose array `field` contains `value`.
    ArrayContains { field: String, value: String },
    /// Documents whose string `field` starts with `prefix`, ordered by that
    /// field, at most `limit` results.
    Prefix {
        field: String,
        prefix: String,
        limit: usize,
    },
    /// Whole collection ordered by `field` ascending.
    OrderedBy { field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub constraint: Constraint,
}

impl Query {
    /// Every conversation the user participates in, in feed order.
    pub fn conversations_of(uid: &UserId) -> Self {
        Self {
            collection: quipapa_shared::constants::CONVERSATIONS_COLLECTION.to_string(),
            constraint: Constraint::ArrayContains {
                field: field::PARTICIPANTS.to_string(),
                value: uid.as_str().to_string(),
            },
        }
    }

    /// One conversation's messages, oldest first.
    pub fn messages_of(conversation: &ConversationId) -> Self {
        Self {
            collection: conversation.messages_collection(),
            constraint: Constraint::OrderedBy {
                field: field::SENT_AT.to_string(),
            },
        }
    }

    /// Prefix search over a profile field (`usernameLower`, or the legacy
    /// `username` for documents written before the lowercase index existed).
    pub fn users_with_prefix(index_field: &str, prefix: &str, limit: usize) -> Self {
        Self {
            collection: quipapa_shared::constants::USERS_COLLECTION.to_string(),
            constraint: Constraint::Prefix {
                field: index_field.to_string(),
                prefix: prefix.to_string(),
                limit,
            },
        }
    }
}

/// Full current result set for a watched query.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub docs: Vec<RawDocument>,
}

/// Live-query handle: a snapshot receiver plus an explicit cancellation
/// hook. Cancelling (or dropping) stops further delivery; the backend may
/// still have one snapshot in flight, which `recv` simply drains.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Snapshot>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// Next snapshot, or `None` once the subscription is cancelled or the
    /// backend side shuts down.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Stop delivery now instead of at drop time.
    pub fn cancel(&mut self) {
        if let Some(unsubscribe) = self.on_cancel.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>, StoreError>;

    /// Upsert. With `merge`, fields absent from `fields` are preserved;
    /// without it the document is replaced wholesale.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Insert with a backend-assigned id. Field values equal to
    /// [`server_timestamp`] are resolved to the backend's monotonic clock.
    async fn append(&self, collection: &str, fields: Value) -> Result<String, StoreError>;

    /// One-shot query, no subscription.
    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError>;
}

#[async_trait]
pub trait LiveQueries: Send + Sync {
    /// Watch `query`. The current result set is delivered immediately, then
    /// again in full after every relevant mutation. Deliveries for different
    /// subscriptions carry no cross-subscription ordering guarantee.
    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError>;
}
