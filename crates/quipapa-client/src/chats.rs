//! Conversation-list reconciliation.
//!
//! Every snapshot delivery is reduced in full: the previous view list is
//! atomically replaced, never patched. Identity lookups go through the
//! memoized resolver and degrade to the placeholder on failure, so one bad
//! document cannot blank the list.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use quipapa_backend::Snapshot;
use quipapa_shared::constants::UNKNOWN_DISPLAY_NAME;
use quipapa_shared::{Conversation, ConversationId, ConversationKind, UserId};

use crate::notify::DedupGate;
use crate::profiles::ProfileResolver;

/// Display-ready conversation list entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub participants: Vec<UserId>,
    pub last_message_text: String,
    pub display_name: String,
    pub display_photo: String,
}

pub struct ConversationReconciler {
    local_uid: UserId,
    resolver: Arc<ProfileResolver>,
    gate: DedupGate,
    // conversation id → last observed summary text; session-scoped, the
    // change detector behind the dedup gate.
    last_seen: HashMap<ConversationId, String>,
}

impl ConversationReconciler {
    pub fn new(local_uid: UserId, resolver: Arc<ProfileResolver>, gate: DedupGate) -> Self {
        Self {
            local_uid,
            resolver,
            gate,
            last_seen: HashMap::new(),
        }
    }

    /// Reduce one snapshot delivery to the full replacement view list,
    /// firing a local notification for every externally-originated summary
    /// change. The diff against the notification record happens exactly
    /// once per delivery, after identity resolution, and the record is
    /// updated whether or not anything fires.
    pub async fn apply(&mut self, snapshot: &Snapshot) -> Vec<ConversationView> {
        let mut views = Vec::with_capacity(snapshot.docs.len());
        for doc in &snapshot.docs {
            let convo = Conversation::from_raw(doc);

            let (display_name, display_photo) = match convo.kind {
                ConversationKind::Group => {
                    (convo.display_name.clone(), convo.display_photo.clone())
                }
                ConversationKind::Direct => {
                    match ProfileResolver::others(&convo.participants, &self.local_uid)
                        .into_iter()
                        .next()
                    {
                        Some(other) => {
                            let profile = self.resolver.fetch(&other).await;
                            (profile.display_name, profile.photo_url)
                        }
                        None => (UNKNOWN_DISPLAY_NAME.to_string(), String::new()),
                    }
                }
            };

            let changed = self
                .last_seen
                .get(&convo.id)
                .map(String::as_str)
                != Some(convo.last_message_text.as_str());
            self.last_seen
                .insert(convo.id.clone(), convo.last_message_text.clone());

            self.gate
                .observe(
                    &display_name,
                    &convo.last_message_text,
                    convo.last_message_sender.as_ref(),
                    changed,
                )
                .await;

            views.push(ConversationView {
                id: convo.id,
                kind: convo.kind,
                participants: convo.participants,
                last_message_text: convo.last_message_text,
                display_name,
                display_photo,
            });
        }
        views
    }
}
