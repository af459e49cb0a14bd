use chrono::Utc;
use serde_json::json;
use tracing::info;

use quipapa_shared::constants::CONVERSATIONS_COLLECTION;
use quipapa_shared::documents::field;
use quipapa_shared::{ChatError, ConversationId, UserId};

use crate::state::AppState;

/// Open the direct conversation with `other`, creating it only when the
/// deterministic id has no document yet, so repeated opens never duplicate.
pub async fn open_or_create_direct(
    state: &AppState,
    other: &UserId,
) -> Result<ConversationId, ChatError> {
    let session = state.session()?;
    let id = ConversationId::direct(&session.uid, other);

    let existing = state
        .store
        .get(CONVERSATIONS_COLLECTION, id.as_str())
        .await?;
    if existing.is_none() {
        state
            .store
            .upsert(
                CONVERSATIONS_COLLECTION,
                id.as_str(),
                json!({
                    (field::PARTICIPANTS): [&session.uid, other],
                    (field::KIND): "direct",
                    (field::LAST_MESSAGE_TEXT): "",
                    (field::LAST_MESSAGE_AT): Utc::now().timestamp_millis(),
                }),
                false,
            )
            .await?;
        info!(conversation = %id, "Direct conversation created");
    }
    Ok(id)
}

/// Create a group conversation. The creator joins automatically and is the
/// sole admin; duplicate selections collapse.
pub async fn create_group(
    state: &AppState,
    name: &str,
    members: &[UserId],
) -> Result<ConversationId, ChatError> {
    let session = state.session()?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::InvalidInput("group name is required".to_string()));
    }
    if members.is_empty() {
        return Err(ChatError::InvalidInput(
            "select at least one member".to_string(),
        ));
    }

    let mut participants = vec![session.uid.clone()];
    for member in members {
        if !participants.contains(member) {
            participants.push(member.clone());
        }
    }

    let id = ConversationId::group();
    state
        .store
        .upsert(
            CONVERSATIONS_COLLECTION,
            id.as_str(),
            json!({
                (field::PARTICIPANTS): participants,
                (field::KIND): field::KIND_GROUP,
                (field::DISPLAY_NAME): name,
                (field::DISPLAY_PHOTO): "",
                (field::ADMINS): [&session.uid],
                (field::LAST_MESSAGE_TEXT): "",
                (field::LAST_MESSAGE_AT): Utc::now().timestamp_millis(),
            }),
            false,
        )
        .await?;

    info!(conversation = %id, members = participants.len(), "Group created");
    Ok(id)
}
