//! Debounced user search.
//!
//! Each keystroke schedules a delayed lookup tagged with a monotonically
//! increasing generation; a lookup whose generation is no longer the latest
//! is discarded without emitting, so only the most recent term's results
//! ever reach the shell.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use quipapa_backend::{DocumentStore, Query};
use quipapa_shared::constants::{SEARCH_DEBOUNCE_MS, SEARCH_RESULT_LIMIT, UNKNOWN_DISPLAY_NAME};
use quipapa_shared::documents::field;
use quipapa_shared::{StoreError, UserId, UserProfile};

use crate::events::{ClientEvent, EventSink};

/// One user-search result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHit {
    pub id: UserId,
    pub display_name: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub photo_url: String,
}

pub struct UserSearch {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn EventSink>,
    local_uid: UserId,
    generation: Arc<AtomicU64>,
}

impl UserSearch {
    pub fn new(store: Arc<dyn DocumentStore>, sink: Arc<dyn EventSink>, local_uid: UserId) -> Self {
        Self {
            store,
            sink,
            local_uid,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Feed one keystroke. The lookup runs after the debounce interval
    /// unless a newer keystroke supersedes it first. An empty term clears
    /// the results without querying the backend.
    pub fn input(&self, term: &str) -> JoinHandle<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let term = term.trim().to_string();
        let store = self.store.clone();
        let sink = self.sink.clone();
        let local_uid = self.local_uid.clone();
        let latest = self.generation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS)).await;
            if latest.load(Ordering::SeqCst) != generation {
                debug!(generation, "Search superseded during debounce");
                return;
            }
            if term.is_empty() {
                sink.emit(ClientEvent::SearchResults {
                    generation,
                    users: Vec::new(),
                });
                return;
            }
            let result = lookup(store.as_ref(), &term, &local_uid).await;
            if latest.load(Ordering::SeqCst) != generation {
                debug!(generation, "Search superseded while querying");
                return;
            }
            match result {
                Ok(users) => sink.emit(ClientEvent::SearchResults { generation, users }),
                Err(error) => sink.emit(ClientEvent::SearchFailed {
                    generation,
                    message: error.to_string(),
                }),
            }
        })
    }
}

async fn lookup(
    store: &dyn DocumentStore,
    term: &str,
    local_uid: &UserId,
) -> Result<Vec<UserHit>, StoreError> {
    let lower = term.to_lowercase();
    let mut docs = store
        .query(&Query::users_with_prefix(
            field::USERNAME_LOWER,
            &lower,
            SEARCH_RESULT_LIMIT,
        ))
        .await?;
    if docs.is_empty() {
        // Profile documents written before the lowercase index existed.
        docs = store
            .query(&Query::users_with_prefix(
                field::USERNAME,
                term,
                SEARCH_RESULT_LIMIT,
            ))
            .await?;
    }
    Ok(docs
        .iter()
        .filter(|doc| doc.id != local_uid.as_str())
        .map(|doc| {
            let profile = UserProfile::from_raw(doc);
            let display_name = if !profile.username.is_empty() {
                profile.username.clone()
            } else if !profile.name.is_empty() {
                profile.name.clone()
            } else {
                UNKNOWN_DISPLAY_NAME.to_string()
            };
            UserHit {
                id: UserId::from(doc.id.as_str()),
                display_name,
                name: profile.name,
                username: profile.username,
                email: profile.email,
                photo_url: profile.photo_url,
            }
        })
        .collect())
}
