//! Application state shared across the command layer and the feed bridge.
//!
//! Every backend collaborator is injected here once and handed around as a
//! trait object, so tests and alternative shells can substitute fakes
//! without touching the core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use quipapa_backend::{AuthService, BlobStore, DocumentStore, LiveQueries, Notifier, Session};
use quipapa_shared::ChatError;

use crate::events::{ClientEvent, EventSink};
use crate::profiles::ProfileResolver;
use crate::settings::AppSettings;

/// Central application state.
pub struct AppState {
    /// Authentication provider (session lifecycle).
    pub auth: Arc<dyn AuthService>,
    /// Document database, point reads and writes.
    pub store: Arc<dyn DocumentStore>,
    /// Live-query side of the document database.
    pub live: Arc<dyn LiveQueries>,
    /// Blob storage for profile photos.
    pub blobs: Arc<dyn BlobStore>,
    /// Platform notification service.
    pub notifier: Arc<dyn Notifier>,
    /// Where reduced state is delivered for rendering.
    pub sink: Arc<dyn EventSink>,
    /// Session-scoped profile memo shared by the list and the timelines.
    pub resolver: Arc<ProfileResolver>,
    /// Live toggle read by the dedup gate on every delivery.
    pub notifications_enabled: Arc<AtomicBool>,
    /// Persisted client settings.
    pub settings: Mutex<AppSettings>,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn AuthService>,
        store: Arc<dyn DocumentStore>,
        live: Arc<dyn LiveQueries>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        let settings = AppSettings::load();
        let notifications_enabled = Arc::new(AtomicBool::new(settings.notifications_enabled));

        // Forward auth transitions to the shell.
        let session_sink = sink.clone();
        auth.on_session_change(Box::new(move |session| {
            session_sink.emit(ClientEvent::SessionChanged { session });
        }));

        Arc::new(Self {
            resolver: Arc::new(ProfileResolver::new(store.clone())),
            auth,
            store,
            live,
            blobs,
            notifier,
            sink,
            notifications_enabled,
            settings: Mutex::new(settings),
        })
    }

    pub fn session(&self) -> Result<Session, ChatError> {
        self.auth.current_session().ok_or(ChatError::NoSession)
    }

    pub fn settings(&self) -> AppSettings {
        self.settings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Search component bound to the current session.
    pub fn user_search(&self) -> Result<crate::search::UserSearch, ChatError> {
        let session = self.session()?;
        Ok(crate::search::UserSearch::new(
            self.store.clone(),
            self.sink.clone(),
            session.uid,
        ))
    }

    /// Persist new settings and apply the live notification toggle.
    pub fn update_settings(&self, settings: AppSettings) -> Result<(), ChatError> {
        settings.save()?;
        self.notifications_enabled
            .store(settings.notifications_enabled, Ordering::Relaxed);
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
        Ok(())
    }
}
