//! Render-ready message timeline with synthetic day separators.

use serde::Serialize;

use quipapa_shared::time::{format_clock, format_day_label};
use quipapa_shared::{Message, UserId};

use crate::profiles::ProfileResolver;

/// One renderable row of a conversation screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimelineItem {
    /// Synthetic separator introducing a new calendar day.
    #[serde(rename_all = "camelCase")]
    Day { id: String, label: String },
    #[serde(rename_all = "camelCase")]
    Message {
        id: String,
        sender_id: UserId,
        text: String,
        /// `HH:mm`, empty while the server timestamp is pending.
        clock: String,
        mine: bool,
        /// Resolved only for non-self messages in group conversations.
        sender_name: Option<String>,
        sender_photo: Option<String>,
    },
}

/// Single linear pass over an ascending-`sentAt` snapshot. A separator is
/// emitted whenever the day label changes; messages whose timestamp has not
/// been assigned yet produce an empty label and never open a new day.
/// Deterministic and idempotent, so the shell can diff output cheaply.
pub fn build_timeline(messages: &[Message], local_uid: &UserId) -> Vec<TimelineItem> {
    let mut items = Vec::with_capacity(messages.len() + 1);
    let mut last_day = String::new();
    for message in messages {
        let label = format_day_label(message.sent_at);
        if !label.is_empty() && label != last_day {
            items.push(TimelineItem::Day {
                id: format!("day-{label}"),
                label: label.clone(),
            });
            last_day = label;
        }
        items.push(TimelineItem::Message {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            text: message.text.clone(),
            clock: format_clock(message.sent_at),
            mine: message.sender_id == *local_uid,
            sender_name: None,
            sender_photo: None,
        });
    }
    items
}

/// Group-chat variant: stamp every non-self message with its sender's
/// resolved identity. Lookups go through the memoized resolver, so a
/// member appearing many times costs one backend read.
pub async fn decorate_group_senders(items: &mut [TimelineItem], resolver: &ProfileResolver) {
    for item in items.iter_mut() {
        if let TimelineItem::Message {
            sender_id,
            mine: false,
            sender_name,
            sender_photo,
            ..
        } = item
        {
            let profile = resolver.fetch(sender_id).await;
            *sender_name = Some(profile.display_name);
            *sender_photo = Some(profile.photo_url);
        }
    }
}
