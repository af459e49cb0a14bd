use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CONVERSATIONS_COLLECTION;

// User identity = the auth provider's opaque uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Deterministic id for a two-party conversation: the lexicographically
    /// smaller uid first, joined by `_`. `direct(a, b)` and `direct(b, a)`
    /// always produce the same id, so creation can be made idempotent by a
    /// point read before the first write.
    pub fn direct(a: &UserId, b: &UserId) -> Self {
        if a.0 <= b.0 {
            Self(format!("{}_{}", a.0, b.0))
        } else {
            Self(format!("{}_{}", b.0, a.0))
        }
    }

    /// Generated opaque id for a group conversation.
    pub fn group() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Collection path of this conversation's message timeline. A message
    /// belongs to exactly one conversation; the conversation owns the
    /// collection.
    pub fn messages_collection(&self) -> String {
        format!("{}/{}/messages", CONVERSATIONS_COLLECTION, self.0)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}
