//! In-process implementation of every backend contract, used by tests and
//! local development.
//!
//! It mimics the managed service's observable behaviour: full-snapshot
//! fan-out to every watcher of a collection on each mutation, a monotonic
//! server clock behind the timestamp sentinel, and merge upserts that
//! preserve unspecified fields.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use quipapa_shared::{AuthError, BlobError, NotifyError, RawDocument, StoreError, UserId};

use crate::auth::{AuthService, Session, SessionCallback};
use crate::blob::{BlobRef, BlobStore};
use crate::notify::Notifier;
use crate::store::{
    Constraint, DocumentStore, LiveQueries, Query, Snapshot, Subscription, SERVER_TIMESTAMP_KEY,
};

struct Watcher {
    id: u64,
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    // collection → (document id → fields)
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    watchers: Mutex<Vec<Watcher>>,
    next_watcher: AtomicU64,
    server_clock: Mutex<i64>,
}

/// Document store + live queries, one shared handle per process.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                watchers: Mutex::new(Vec::new()),
                next_watcher: AtomicU64::new(0),
                server_clock: Mutex::new(0),
            }),
        }
    }

    /// Strictly increasing even when the wall clock stalls within one
    /// millisecond.
    fn next_server_millis(&self) -> i64 {
        let mut clock = match self.inner.server_clock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now().timestamp_millis();
        *clock = now.max(*clock + 1);
        *clock
    }

    /// Re-evaluate and deliver a full snapshot to every watcher of
    /// `collection`.
    async fn notify_watchers(&self, collection: &str) {
        let deliveries: Vec<(mpsc::UnboundedSender<Snapshot>, Snapshot)> = {
            let collections = self.inner.collections.read().await;
            let watchers = match self.inner.watchers.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            watchers
                .iter()
                .filter(|w| w.query.collection == collection)
                .map(|w| {
                    let snapshot = Snapshot {
                        docs: evaluate(&collections, &w.query),
                    };
                    (w.tx.clone(), snapshot)
                })
                .collect()
        };
        for (tx, snapshot) in deliveries {
            // Receiver gone = subscription mid-teardown; nothing to do.
            let _ = tx.send(snapshot);
        }
    }
}

fn evaluate(
    collections: &HashMap<String, BTreeMap<String, Value>>,
    query: &Query,
) -> Vec<RawDocument> {
    let Some(docs) = collections.get(&query.collection) else {
        return Vec::new();
    };
    match &query.constraint {
        Constraint::ArrayContains { field, value } => docs
            .iter()
            .filter(|(_, fields)| {
                fields
                    .get(field)
                    .and_then(Value::as_array)
                    .is_some_and(|arr| arr.iter().any(|v| v.as_str() == Some(value.as_str())))
            })
            .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
            .collect(),
        Constraint::Prefix {
            field,
            prefix,
            limit,
        } => {
            let mut hits: Vec<(String, RawDocument)> = docs
                .iter()
                .filter_map(|(id, fields)| {
                    let indexed = fields.get(field)?.as_str()?;
                    indexed
                        .starts_with(prefix.as_str())
                        .then(|| (indexed.to_string(), RawDocument::new(id.clone(), fields.clone())))
                })
                .collect();
            hits.sort_by(|a, b| a.0.cmp(&b.0));
            hits.truncate(*limit);
            hits.into_iter().map(|(_, doc)| doc).collect()
        }
        Constraint::OrderedBy { field } => {
            let mut all: Vec<RawDocument> = docs
                .iter()
                .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
                .collect();
            // Documents missing the order field sort first; the sort is
            // stable, so id order breaks ties deterministically.
            all.sort_by_key(|doc| doc.fields.get(field).and_then(Value::as_i64).unwrap_or(i64::MIN));
            all
        }
    }
}

fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key(SERVER_TIMESTAMP_KEY))
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| RawDocument::new(id, fields.clone())))
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        merge: bool,
    ) -> Result<(), StoreError> {
        let incoming = fields.as_object().cloned().ok_or(StoreError::Malformed {
            collection: collection.to_string(),
            reason: "document fields must be an object".to_string(),
        })?;
        {
            let mut collections = self.inner.collections.write().await;
            let docs = collections.entry(collection.to_string()).or_default();
            match docs.entry(id.to_string()) {
                Entry::Occupied(mut occupied) if merge => {
                    let existing = occupied.get_mut();
                    if let Some(target) = existing.as_object_mut() {
                        for (key, value) in incoming {
                            target.insert(key, value);
                        }
                    } else {
                        *existing = Value::Object(incoming);
                    }
                }
                Entry::Occupied(mut occupied) => {
                    occupied.insert(Value::Object(incoming));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Value::Object(incoming));
                }
            }
        }
        self.notify_watchers(collection).await;
        Ok(())
    }

    async fn append(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        let mut incoming = fields.as_object().cloned().ok_or(StoreError::Malformed {
            collection: collection.to_string(),
            reason: "document fields must be an object".to_string(),
        })?;
        for value in incoming.values_mut() {
            if is_server_timestamp(value) {
                *value = Value::from(self.next_server_millis());
            }
        }
        let id = Uuid::new_v4().simple().to_string();
        {
            let mut collections = self.inner.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), Value::Object(incoming));
        }
        self.notify_watchers(collection).await;
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError> {
        let collections = self.inner.collections.read().await;
        Ok(evaluate(&collections, query))
    }
}

#[async_trait]
impl LiveQueries for MemoryBackend {
    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = {
            let collections = self.inner.collections.read().await;
            Snapshot {
                docs: evaluate(&collections, &query),
            }
        };
        let id = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        debug!(watcher = id, collection = %query.collection, "Live query opened");
        {
            let mut watchers = self
                .inner
                .watchers
                .lock()
                .map_err(|_| StoreError::Backend("watcher registry poisoned".to_string()))?;
            watchers.push(Watcher {
                id,
                query,
                tx: tx.clone(),
            });
        }
        let _ = tx.send(initial);
        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(rx, move || {
            if let Ok(mut watchers) = inner.watchers.lock() {
                watchers.retain(|w| w.id != id);
            }
        }))
    }
}

struct Account {
    uid: UserId,
    email: String,
    password: String,
}

/// In-process auth provider.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Session>>,
    callbacks: Mutex<Vec<SessionCallback>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_session(&self, session: Option<Session>) {
        if let Ok(mut current) = self.session.lock() {
            *current = session.clone();
        }
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                callback(session.clone());
            }
        }
    }
}

#[async_trait]
impl AuthService for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }
        if password.len() < 6 {
            return Err(AuthError::WeakPassword);
        }
        let session = {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Provider("account registry poisoned".to_string()))?;
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            let uid = UserId(Uuid::new_v4().simple().to_string());
            accounts.insert(
                email.clone(),
                Account {
                    uid: uid.clone(),
                    email: email.clone(),
                    password: password.to_string(),
                },
            );
            Session { uid, email }
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();
        let session = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Provider("account registry poisoned".to_string()))?;
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            Session {
                uid: account.uid.clone(),
                email: account.email.clone(),
            }
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_session(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session.lock().ok().and_then(|guard| guard.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }
}

/// In-process blob store.
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<BlobRef, BlobError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| BlobError::Upload("blob registry poisoned".to_string()))?;
        blobs.insert(path.to_string(), bytes);
        Ok(BlobRef(path.to_string()))
    }

    async fn public_url(&self, blob: &BlobRef) -> Result<String, BlobError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| BlobError::Upload("blob registry poisoned".to_string()))?;
        if !blobs.contains_key(&blob.0) {
            return Err(BlobError::UnknownRef(blob.0.clone()));
        }
        Ok(format!("mem://{}", blob.0))
    }
}

/// A local notification as handed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub title: String,
    pub body: String,
}

/// In-process notifier. Permission and scheduling failures are switchable
/// so callers can exercise the degraded paths.
pub struct MemoryNotifier {
    granted: AtomicBool,
    fail_schedule: AtomicBool,
    delivered: Mutex<Vec<DeliveredNotification>>,
    tokens: Mutex<Vec<String>>,
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self {
            granted: AtomicBool::new(true),
            fail_schedule: AtomicBool::new(false),
            delivered: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_permission(&self) {
        self.granted.store(false, Ordering::Relaxed);
    }

    pub fn fail_scheduling(&self, fail: bool) {
        self.fail_schedule.store(fail, Ordering::Relaxed);
    }

    /// Every notification scheduled so far, in order.
    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn registered_tokens(&self) -> Vec<String> {
        self.tokens
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn request_permission(&self) -> Result<bool, NotifyError> {
        Ok(self.granted.load(Ordering::Relaxed))
    }

    async fn schedule(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail_schedule.load(Ordering::Relaxed) {
            return Err(NotifyError::Schedule(
                "platform rejected the notification".to_string(),
            ));
        }
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(DeliveredNotification {
                title: title.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }

    async fn register_push_token(&self, token: &str) -> Result<(), NotifyError> {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.push(token.to_string());
        }
        Ok(())
    }
}
