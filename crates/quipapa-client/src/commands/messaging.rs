use chrono::Utc;
use serde_json::json;
use tracing::info;

use quipapa_backend::server_timestamp;
use quipapa_shared::constants::CONVERSATIONS_COLLECTION;
use quipapa_shared::documents::field;
use quipapa_shared::{ChatError, ConversationId};

use crate::state::AppState;

/// Append a message, then refresh the conversation summary.
///
/// The two writes are sequential and not atomic; the summary update always
/// follows the append, so a reader can observe a message the summary does
/// not reflect yet, never the reverse. The summary carries the sender id
/// precisely so the sender's own echo does not notify them.
pub async fn send_message(
    state: &AppState,
    conversation: &ConversationId,
    text: &str,
) -> Result<String, ChatError> {
    let session = state.session()?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::InvalidInput("message text is empty".to_string()));
    }

    let message_id = state
        .store
        .append(
            &conversation.messages_collection(),
            json!({
                (field::SENDER_ID): &session.uid,
                (field::TEXT): text,
                (field::SENT_AT): server_timestamp(),
            }),
        )
        .await?;

    state
        .store
        .upsert(
            CONVERSATIONS_COLLECTION,
            conversation.as_str(),
            json!({
                (field::LAST_MESSAGE_TEXT): text,
                (field::LAST_MESSAGE_SENDER_ID): &session.uid,
                (field::LAST_MESSAGE_AT): Utc::now().timestamp_millis(),
            }),
            true,
        )
        .await?;

    info!(message = %message_id, conversation = %conversation, "Message sent");
    Ok(message_id)
}
