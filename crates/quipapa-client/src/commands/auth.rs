use chrono::Utc;
use serde_json::json;
use tracing::info;

use quipapa_backend::Session;
use quipapa_shared::constants::USERS_COLLECTION;
use quipapa_shared::documents::field;
use quipapa_shared::ChatError;

use crate::state::AppState;

/// Create an account, then its profile document. The username is indexed
/// twice: verbatim and lowercased, for case-insensitive prefix search.
pub async fn sign_up(
    state: &AppState,
    name: &str,
    username: &str,
    email: &str,
    password: &str,
) -> Result<Session, ChatError> {
    let name = name.trim();
    let username = username.trim();
    let email = email.trim();
    if name.is_empty() || username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ChatError::InvalidInput("all fields are required".to_string()));
    }

    let session = state.auth.sign_up(email, password).await?;
    state
        .store
        .upsert(
            USERS_COLLECTION,
            session.uid.as_str(),
            json!({
                (field::NAME): name,
                (field::USERNAME): username,
                (field::USERNAME_LOWER): username.to_lowercase(),
                (field::EMAIL): email,
                (field::CREATED_AT): Utc::now().timestamp_millis(),
            }),
            false,
        )
        .await?;

    info!(user = %session.uid, "Account created");
    Ok(session)
}

pub async fn sign_in(state: &AppState, email: &str, password: &str) -> Result<Session, ChatError> {
    let session = state.auth.sign_in(email, password).await?;
    info!(user = %session.uid, "Signed in");

    // Remember the address for the next launch; purely cosmetic, so a
    // failed save only logs.
    let mut settings = state.settings();
    settings.last_email = Some(session.email.clone());
    if let Err(error) = state.update_settings(settings) {
        tracing::warn!(error = %error, "Failed to persist last e-mail");
    }
    Ok(session)
}

pub async fn sign_out(state: &AppState) -> Result<(), ChatError> {
    state.auth.sign_out().await?;
    info!("Signed out");
    Ok(())
}
