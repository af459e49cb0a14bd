//! Typed views over raw backend documents.
//!
//! The document database hands back loosely typed field maps; everything is
//! parsed into these records at the boundary, with sentinel defaults for
//! absent or malformed fields. One bad document degrades to defaults, it
//! never takes the whole snapshot down.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::time::datetime_from_millis;
use crate::types::{ConversationId, ConversationKind, UserId};

/// Document field names, shared by parsers, writers and query builders.
pub mod field {
    pub const PARTICIPANTS: &str = "participants";
    pub const KIND: &str = "kind";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const DISPLAY_PHOTO: &str = "displayPhoto";
    pub const ADMINS: &str = "admins";
    pub const LAST_MESSAGE_TEXT: &str = "lastMessageText";
    pub const LAST_MESSAGE_SENDER_ID: &str = "lastMessageSenderId";
    pub const LAST_MESSAGE_AT: &str = "lastMessageAt";

    pub const SENDER_ID: &str = "senderId";
    pub const TEXT: &str = "text";
    pub const SENT_AT: &str = "sentAt";

    pub const UID: &str = "uid";
    pub const NAME: &str = "name";
    pub const PHOTO_URL: &str = "photoUrl";
    pub const USERNAME: &str = "username";
    pub const USERNAME_LOWER: &str = "usernameLower";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
    pub const PUSH_TOKENS: &str = "pushTokens";
    pub const FCM_TOKENS: &str = "fcmTokens";

    pub const KIND_GROUP: &str = "group";
}

/// One raw document as delivered by the backend: opaque id plus loosely
/// typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: Value,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

fn string_field(fields: &Value, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn id_array(fields: &Value, key: &str) -> Vec<UserId> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(UserId::from)
                .collect()
        })
        .unwrap_or_default()
}

fn string_array(fields: &Value, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn timestamp_field(fields: &Value, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(Value::as_i64)
        .and_then(datetime_from_millis)
}

/// Conversation summary document (collection `conversations`).
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    pub kind: ConversationKind,
    /// Group-only; direct conversations derive their display identity from
    /// the other participant's profile at read time.
    pub display_name: String,
    pub display_photo: String,
    pub admins: Vec<UserId>,
    pub last_message_text: String,
    pub last_message_sender: Option<UserId>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn from_raw(doc: &RawDocument) -> Self {
        let fields = &doc.fields;
        let kind = if string_field(fields, field::KIND) == field::KIND_GROUP {
            ConversationKind::Group
        } else {
            ConversationKind::Direct
        };
        let sender = string_field(fields, field::LAST_MESSAGE_SENDER_ID);
        Self {
            id: ConversationId(doc.id.clone()),
            participants: id_array(fields, field::PARTICIPANTS),
            kind,
            display_name: string_field(fields, field::DISPLAY_NAME),
            display_photo: string_field(fields, field::DISPLAY_PHOTO),
            admins: id_array(fields, field::ADMINS),
            last_message_text: string_field(fields, field::LAST_MESSAGE_TEXT),
            last_message_sender: (!sender.is_empty()).then(|| UserId(sender)),
            last_message_at: timestamp_field(fields, field::LAST_MESSAGE_AT),
        }
    }
}

/// Message document (collection `conversations/{id}/messages`).
/// Append-only and immutable once written; the owning conversation is
/// encoded in the collection path.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub text: String,
    /// Server-assigned; `None` on a freshly appended message whose
    /// timestamp has not round-tripped yet.
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn from_raw(doc: &RawDocument) -> Self {
        Self {
            id: doc.id.clone(),
            sender_id: UserId(string_field(&doc.fields, field::SENDER_ID)),
            text: string_field(&doc.fields, field::TEXT),
            sent_at: timestamp_field(&doc.fields, field::SENT_AT),
        }
    }
}

/// User profile document (collection `users`, keyed by uid).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserProfile {
    pub name: String,
    pub username: String,
    pub username_lower: String,
    pub email: String,
    /// Empty when the user has not uploaded a photo.
    pub photo_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub push_tokens: Vec<String>,
    pub fcm_tokens: Vec<String>,
}

impl UserProfile {
    pub fn from_raw(doc: &RawDocument) -> Self {
        let fields = &doc.fields;
        Self {
            name: string_field(fields, field::NAME),
            username: string_field(fields, field::USERNAME),
            username_lower: string_field(fields, field::USERNAME_LOWER),
            email: string_field(fields, field::EMAIL),
            photo_url: string_field(fields, field::PHOTO_URL),
            created_at: timestamp_field(fields, field::CREATED_AT),
            push_tokens: string_array(fields, field::PUSH_TOKENS),
            fcm_tokens: string_array(fields, field::FCM_TOKENS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversation_defaults_to_direct_kind() {
        let doc = RawDocument::new(
            "u1_u2",
            json!({
                "participants": ["u1", "u2"],
                "lastMessageText": "oi",
                "lastMessageSenderId": "u1",
                "lastMessageAt": 1_700_000_000_000i64,
            }),
        );
        let convo = Conversation::from_raw(&doc);
        assert_eq!(convo.kind, ConversationKind::Direct);
        assert_eq!(convo.participants, vec![UserId::from("u1"), UserId::from("u2")]);
        assert_eq!(convo.last_message_text, "oi");
        assert_eq!(convo.last_message_sender, Some(UserId::from("u1")));
        assert!(convo.last_message_at.is_some());
    }

    #[test]
    fn group_conversation_carries_its_own_display_identity() {
        let doc = RawDocument::new(
            "g1",
            json!({
                "participants": ["u1", "u2", "u3"],
                "kind": "group",
                "displayName": "Família",
                "displayPhoto": "https://example.com/g.jpg",
                "admins": ["u1"],
            }),
        );
        let convo = Conversation::from_raw(&doc);
        assert_eq!(convo.kind, ConversationKind::Group);
        assert_eq!(convo.display_name, "Família");
        assert_eq!(convo.admins, vec![UserId::from("u1")]);
        assert_eq!(convo.last_message_text, "");
        assert_eq!(convo.last_message_sender, None);
    }

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let doc = RawDocument::new(
            "broken",
            json!({
                "participants": "not-an-array",
                "lastMessageText": 42,
            }),
        );
        let convo = Conversation::from_raw(&doc);
        assert!(convo.participants.is_empty());
        assert_eq!(convo.last_message_text, "");
    }

    #[test]
    fn message_without_timestamp_parses_to_none() {
        let doc = RawDocument::new("m1", json!({ "senderId": "u1", "text": "oi" }));
        let msg = Message::from_raw(&doc);
        assert_eq!(msg.sent_at, None);
        assert_eq!(msg.text, "oi");
    }

    #[test]
    fn profile_parses_token_arrays() {
        let doc = RawDocument::new(
            "u1",
            json!({
                "name": "Ana",
                "username": "AnaB",
                "usernameLower": "anab",
                "email": "ana@example.com",
                "pushTokens": ["ExponentPushToken[x]"],
            }),
        );
        let profile = UserProfile::from_raw(&doc);
        assert_eq!(profile.name, "Ana");
        assert_eq!(profile.push_tokens, vec!["ExponentPushToken[x]".to_string()]);
        assert!(profile.fcm_tokens.is_empty());
        assert_eq!(profile.photo_url, "");
    }
}
