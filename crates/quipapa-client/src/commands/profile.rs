use serde_json::json;
use tracing::{info, warn};

use quipapa_shared::constants::{PROFILE_PHOTO_PREFIX, USERS_COLLECTION};
use quipapa_shared::documents::field;
use quipapa_shared::{ChatError, UserId, UserProfile};

use crate::state::AppState;

/// Point-read any user's profile; `Ok(None)` when the document is absent.
pub async fn load(state: &AppState, uid: &UserId) -> Result<Option<UserProfile>, ChatError> {
    let doc = state.store.get(USERS_COLLECTION, uid.as_str()).await?;
    Ok(doc.as_ref().map(UserProfile::from_raw))
}

/// Update the signed-in user's display name and photo URL (merge; other
/// profile fields are untouched).
pub async fn update(state: &AppState, name: &str, photo_url: &str) -> Result<(), ChatError> {
    let session = state.session()?;
    state
        .store
        .upsert(
            USERS_COLLECTION,
            session.uid.as_str(),
            json!({
                (field::NAME): name.trim(),
                (field::PHOTO_URL): photo_url.trim(),
            }),
            true,
        )
        .await?;
    info!(user = %session.uid, "Profile updated");
    Ok(())
}

/// Upload a new profile photo and write its public URL back to the profile
/// document. Returns the URL.
pub async fn upload_photo(state: &AppState, bytes: bytes::Bytes) -> Result<String, ChatError> {
    let session = state.session()?;
    let path = format!("{}{}.jpg", PROFILE_PHOTO_PREFIX, session.uid);
    let blob = state.blobs.upload(&path, bytes).await?;
    let url = state.blobs.public_url(&blob).await?;
    state
        .store
        .upsert(
            USERS_COLLECTION,
            session.uid.as_str(),
            json!({ (field::PHOTO_URL): url }),
            true,
        )
        .await?;
    info!(user = %session.uid, "Profile photo uploaded");
    Ok(url)
}

/// Record the device's push tokens on the profile document.
///
/// Asks for platform permission first; a decline (or a permission check
/// failure) is a quiet no-op reported as `Ok(false)`. Tokens are appended
/// to the existing arrays, skipping blanks and duplicates, via a merge
/// upsert that leaves the rest of the document alone.
pub async fn register_push_tokens(
    state: &AppState,
    expo_token: Option<&str>,
    device_token: Option<&str>,
) -> Result<bool, ChatError> {
    let session = state.session()?;

    let granted = match state.notifier.request_permission().await {
        Ok(granted) => granted,
        Err(error) => {
            warn!(error = %error, "Notification permission check failed");
            false
        }
    };
    if !granted {
        return Ok(false);
    }

    // Make sure the profile document exists before merging into it.
    state
        .store
        .upsert(
            USERS_COLLECTION,
            session.uid.as_str(),
            json!({ (field::UID): &session.uid }),
            true,
        )
        .await?;

    let profile = load(state, &session.uid).await?.unwrap_or_default();
    let mut push_tokens = profile.push_tokens;
    let mut fcm_tokens = profile.fcm_tokens;

    let mut accepted: Vec<String> = Vec::new();
    if let Some(token) = expo_token.map(str::trim).filter(|t| !t.is_empty()) {
        if !push_tokens.iter().any(|t| t == token) {
            push_tokens.push(token.to_string());
            accepted.push(token.to_string());
        }
    }
    if let Some(token) = device_token.map(str::trim).filter(|t| !t.is_empty()) {
        if !fcm_tokens.iter().any(|t| t == token) {
            fcm_tokens.push(token.to_string());
            accepted.push(token.to_string());
        }
    }

    if !accepted.is_empty() {
        state
            .store
            .upsert(
                USERS_COLLECTION,
                session.uid.as_str(),
                json!({
                    (field::PUSH_TOKENS): push_tokens,
                    (field::FCM_TOKENS): fcm_tokens,
                }),
                true,
            )
            .await?;
    }

    for token in &accepted {
        if let Err(error) = state.notifier.register_push_token(token).await {
            warn!(error = %error, "Push token registration failed");
        }
    }

    info!(user = %session.uid, tokens = accepted.len(), "Push tokens recorded");
    Ok(true)
}
