//! Typed events emitted by the client core for the embedding shell.
//!
//! The core never draws anything; it reduces backend snapshots to these
//! payloads and hands them to whatever [`EventSink`] was injected.

use serde::Serialize;
use tokio::sync::mpsc;

use quipapa_backend::Session;
use quipapa_shared::ConversationId;

use crate::chats::ConversationView;
use crate::search::UserHit;
use crate::timeline::TimelineItem;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Full replacement of the conversation list.
    ConversationsUpdated { conversations: Vec<ConversationView> },
    /// Full replacement of one conversation's rendered timeline.
    TimelineUpdated {
        #[serde(rename = "conversationId")]
        conversation_id: ConversationId,
        items: Vec<TimelineItem>,
    },
    /// Header identity for a direct conversation, resolved once per screen.
    PeerResolved {
        #[serde(rename = "conversationId")]
        conversation_id: ConversationId,
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "photoUrl")]
        photo_url: String,
    },
    /// Auth session transition; `None` means signed out.
    SessionChanged { session: Option<Session> },
    /// Results for the user search generation that produced them.
    SearchResults { generation: u64, users: Vec<UserHit> },
    /// A user-search query failed; stale generations never surface here.
    SearchFailed { generation: u64, message: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

/// Sink that forwards events over an unbounded channel; handy for tests and
/// for shells that pump a queue on their own loop.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ClientEvent) {
        // Receiver gone = shell already torn down; nothing left to render to.
        let _ = self.tx.send(event);
    }
}
