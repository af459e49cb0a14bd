//! Identity/membership resolution with a per-session memo cache.
//!
//! Profile lookups happen inside reactive paths (list reconciliation, group
//! timelines), so failures degrade to a placeholder identity instead of
//! propagating. Concurrent lookups for the same uid coalesce into a single
//! backend read; the cache is never invalidated within a session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::debug;

use quipapa_backend::DocumentStore;
use quipapa_shared::constants::{UNKNOWN_DISPLAY_NAME, USERS_COLLECTION};
use quipapa_shared::{UserId, UserProfile};

/// The subset of a profile the screens render.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub display_name: String,
    pub photo_url: String,
}

impl ResolvedProfile {
    /// Placeholder identity for missing or malformed profiles.
    pub fn placeholder() -> Self {
        Self {
            display_name: UNKNOWN_DISPLAY_NAME.to_string(),
            photo_url: String::new(),
        }
    }
}

enum CacheEntry {
    Ready(ResolvedProfile),
    // A fetch is in flight; followers wait on this instead of issuing
    // their own backend read.
    Pending(watch::Receiver<Option<ResolvedProfile>>),
}

pub struct ProfileResolver {
    store: Arc<dyn DocumentStore>,
    cache: Mutex<HashMap<UserId, CacheEntry>>,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Participants other than the local user.
    pub fn others(participants: &[UserId], local: &UserId) -> Vec<UserId> {
        participants
            .iter()
            .filter(|uid| *uid != local)
            .cloned()
            .collect()
    }

    /// Resolve `uid`, reading the backend at most once per session for it.
    pub async fn fetch(&self, uid: &UserId) -> ResolvedProfile {
        enum Role {
            Leader(watch::Sender<Option<ResolvedProfile>>),
            Follower(watch::Receiver<Option<ResolvedProfile>>),
        }

        let role = {
            let mut cache = self.cache.lock().await;
            match cache.get(uid) {
                Some(CacheEntry::Ready(profile)) => return profile.clone(),
                Some(CacheEntry::Pending(rx)) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    cache.insert(uid.clone(), CacheEntry::Pending(rx));
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let profile = self.load(uid).await;
                let mut cache = self.cache.lock().await;
                cache.insert(uid.clone(), CacheEntry::Ready(profile.clone()));
                let _ = tx.send(Some(profile.clone()));
                profile
            }
            Role::Follower(mut rx) => {
                // Clone the awaited value out of the watch guard before the
                // match so the `!Send` guard isn't held across the await in
                // the Err branch.
                let resolved = rx
                    .wait_for(|value| value.is_some())
                    .await
                    .map(|value| value.clone());
                match resolved {
                    Ok(value) => value.unwrap_or_else(ResolvedProfile::placeholder),
                    // The leader's task was torn down mid-fetch; do the read
                    // ourselves rather than wedging this caller.
                    Err(_) => {
                        let profile = self.load(uid).await;
                        let mut cache = self.cache.lock().await;
                        cache.insert(uid.clone(), CacheEntry::Ready(profile.clone()));
                        profile
                    }
                }
            }
        }
    }

    async fn load(&self, uid: &UserId) -> ResolvedProfile {
        match self.store.get(USERS_COLLECTION, uid.as_str()).await {
            Ok(Some(doc)) => {
                let profile = UserProfile::from_raw(&doc);
                ResolvedProfile {
                    display_name: if profile.name.is_empty() {
                        UNKNOWN_DISPLAY_NAME.to_string()
                    } else {
                        profile.name
                    },
                    photo_url: profile.photo_url,
                }
            }
            Ok(None) => ResolvedProfile::placeholder(),
            Err(error) => {
                debug!(user = %uid, error = %error, "Profile lookup failed, using placeholder");
                ResolvedProfile::placeholder()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn others_excludes_the_local_user() {
        let participants = vec![UserId::from("u1"), UserId::from("u2"), UserId::from("u3")];
        assert_eq!(
            ProfileResolver::others(&participants, &UserId::from("u2")),
            vec![UserId::from("u1"), UserId::from("u3")]
        );
    }

    #[test]
    fn others_is_empty_for_malformed_participant_lists() {
        let participants = vec![UserId::from("u1")];
        assert!(ProfileResolver::others(&participants, &UserId::from("u1")).is_empty());
    }
}
