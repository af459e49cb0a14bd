/// End-to-end tests for the reconciliation/notification core, driven
/// through the in-process backend: snapshot reconciliation, notification
/// dedup, profile coalescing and feed lifecycle.
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use quipapa_backend::{
    AuthService, DocumentStore, MemoryAuth, MemoryBackend, MemoryBlobs, MemoryNotifier, Session,
    Snapshot,
};
use quipapa_client::commands;
use quipapa_client::{
    spawn_conversation_feed, spawn_message_feed, AppState, ChannelSink, ClientEvent,
    ConversationReconciler, DedupGate, ProfileResolver,
};
use quipapa_shared::{RawDocument, UserId};

struct Harness {
    state: Arc<AppState>,
    backend: MemoryBackend,
    auth: Arc<MemoryAuth>,
    notifier: Arc<MemoryNotifier>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

fn harness() -> Harness {
    let backend = MemoryBackend::new();
    let auth = Arc::new(MemoryAuth::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let (sink, events) = ChannelSink::new();
    let state = AppState::new(
        auth.clone(),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        Arc::new(MemoryBlobs::new()),
        notifier.clone(),
        Arc::new(sink),
    );
    // Whatever the machine's settings file says, these tests assert on
    // notification behaviour.
    state
        .notifications_enabled
        .store(true, std::sync::atomic::Ordering::Relaxed);
    Harness {
        state,
        backend,
        auth,
        notifier,
        events,
    }
}

async fn next_conversations(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
) -> Vec<quipapa_client::ConversationView> {
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed");
        if let ClientEvent::ConversationsUpdated { conversations } = event {
            return conversations;
        }
    }
}

async fn next_timeline(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
) -> Vec<quipapa_client::TimelineItem> {
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed");
        if let ClientEvent::TimelineUpdated { items, .. } = event {
            return items;
        }
    }
}

/// Sign up two users through the command layer (so profile documents
/// exist) and leave the second one signed in.
async fn two_users(h: &Harness) -> (Session, Session) {
    let alice = commands::auth::sign_up(&h.state, "Alice", "alice", "alice@example.com", "secret1")
        .await
        .unwrap();
    let bruna = commands::auth::sign_up(&h.state, "Bruna", "bruna", "bruna@example.com", "secret1")
        .await
        .unwrap();
    (alice, bruna)
}

#[tokio::test]
async fn remote_summary_change_notifies_exactly_once() {
    let mut h = harness();
    let (alice, bruna) = two_users(&h).await;

    // Conversation already exists backend-side with an empty summary.
    let convo = quipapa_shared::ConversationId::direct(&alice.uid, &bruna.uid);
    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "participants": [alice.uid.as_str(), bruna.uid.as_str()], "lastMessageText": "" }),
            false,
        )
        .await
        .unwrap();

    // Bruna is signed in and watching her list.
    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let initial = next_conversations(&mut h.events).await;
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].display_name, "Alice");
    assert!(h.notifier.delivered().is_empty());

    // Alice's write round-trips through the feed.
    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "lastMessageText": "hi", "lastMessageSenderId": alice.uid.as_str() }),
            true,
        )
        .await
        .unwrap();
    let updated = next_conversations(&mut h.events).await;
    assert_eq!(updated[0].last_message_text, "hi");

    let delivered = h.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Alice");
    assert_eq!(delivered[0].body, "hi");

    // The identical summary delivered again fires nothing.
    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "lastMessageText": "hi", "lastMessageSenderId": alice.uid.as_str() }),
            true,
        )
        .await
        .unwrap();
    let _ = next_conversations(&mut h.events).await;
    assert_eq!(h.notifier.delivered().len(), 1);

    feed.close().await;
}

#[tokio::test]
async fn own_messages_never_notify_the_sender() {
    let mut h = harness();
    let (alice, _bruna) = two_users(&h).await;

    let convo = commands::conversations::open_or_create_direct(&h.state, &alice.uid)
        .await
        .unwrap();

    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let _ = next_conversations(&mut h.events).await;

    // Bruna (the local user) sends; her own summary echo must not notify.
    commands::messaging::send_message(&h.state, &convo, "oi Alice")
        .await
        .unwrap();
    let updated = next_conversations(&mut h.events).await;
    assert_eq!(updated[0].last_message_text, "oi Alice");
    assert!(h.notifier.delivered().is_empty());

    feed.close().await;
}

#[tokio::test]
async fn reconciler_is_idempotent_on_an_unchanged_snapshot() {
    let h = harness();
    let (alice, bruna) = two_users(&h).await;

    let resolver = Arc::new(ProfileResolver::new(Arc::new(h.backend.clone())));
    let gate = DedupGate::new(
        h.notifier.clone(),
        bruna.uid.clone(),
        h.state.notifications_enabled.clone(),
    );
    let mut reconciler = ConversationReconciler::new(bruna.uid.clone(), resolver, gate);

    let snapshot = Snapshot {
        docs: vec![RawDocument::new(
            "a_b",
            json!({
                "participants": [alice.uid.as_str(), bruna.uid.as_str()],
                "lastMessageText": "hi",
                "lastMessageSenderId": alice.uid.as_str(),
            }),
        )],
    };

    let first = reconciler.apply(&snapshot).await;
    let second = reconciler.apply(&snapshot).await;
    assert_eq!(first, second);
    // The change fired once; the replay did not.
    assert_eq!(h.notifier.delivered().len(), 1);
}

#[tokio::test]
async fn malformed_conversations_degrade_to_the_placeholder() {
    let h = harness();
    let (_alice, bruna) = two_users(&h).await;

    let resolver = Arc::new(ProfileResolver::new(Arc::new(h.backend.clone())));
    let gate = DedupGate::new(
        h.notifier.clone(),
        bruna.uid.clone(),
        h.state.notifications_enabled.clone(),
    );
    let mut reconciler = ConversationReconciler::new(bruna.uid.clone(), resolver, gate);

    // No other participant can be identified.
    let snapshot = Snapshot {
        docs: vec![RawDocument::new(
            "broken",
            json!({ "participants": [bruna.uid.as_str()], "lastMessageText": "?" }),
        )],
    };
    let views = reconciler.apply(&snapshot).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].display_name, "Usuário");
    assert_eq!(views[0].display_photo, "");
}

#[tokio::test]
async fn group_conversations_use_their_own_display_identity() {
    let mut h = harness();
    let (alice, _bruna) = two_users(&h).await;

    commands::conversations::create_group(&h.state, "Família", &[alice.uid.clone()])
        .await
        .unwrap();

    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let conversations = next_conversations(&mut h.events).await;
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].display_name, "Família");
    assert_eq!(conversations[0].kind, quipapa_shared::ConversationKind::Group);

    feed.close().await;
}

#[tokio::test]
async fn scheduling_failures_never_break_reconciliation() {
    let mut h = harness();
    let (alice, bruna) = two_users(&h).await;

    let convo = quipapa_shared::ConversationId::direct(&alice.uid, &bruna.uid);
    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "participants": [alice.uid.as_str(), bruna.uid.as_str()], "lastMessageText": "" }),
            false,
        )
        .await
        .unwrap();

    h.notifier.fail_scheduling(true);
    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let _ = next_conversations(&mut h.events).await;

    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "lastMessageText": "hi", "lastMessageSenderId": alice.uid.as_str() }),
            true,
        )
        .await
        .unwrap();

    // The list still renders; the platform failure was swallowed.
    let updated = next_conversations(&mut h.events).await;
    assert_eq!(updated[0].last_message_text, "hi");
    assert!(h.notifier.delivered().is_empty());

    feed.close().await;
}

#[tokio::test]
async fn closed_feed_stops_delivering() {
    let mut h = harness();
    let (alice, bruna) = two_users(&h).await;

    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let _ = next_conversations(&mut h.events).await;
    feed.close().await;

    let convo = quipapa_shared::ConversationId::direct(&alice.uid, &bruna.uid);
    h.backend
        .upsert(
            "conversations",
            convo.as_str(),
            json!({ "participants": [alice.uid.as_str(), bruna.uid.as_str()], "lastMessageText": "oi" }),
            false,
        )
        .await
        .unwrap();

    assert!(
        timeout(Duration::from_millis(100), h.events.recv())
            .await
            .is_err(),
        "no event may arrive after the feed is closed"
    );
}

#[tokio::test]
async fn concurrent_profile_fetches_coalesce_into_one_read() {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts point reads and makes them slow enough to
    /// overlap.
    struct CountingStore {
        inner: MemoryBackend,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<RawDocument>, quipapa_shared::StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.get(collection, id).await
        }

        async fn upsert(
            &self,
            collection: &str,
            id: &str,
            fields: serde_json::Value,
            merge: bool,
        ) -> Result<(), quipapa_shared::StoreError> {
            self.inner.upsert(collection, id, fields, merge).await
        }

        async fn append(
            &self,
            collection: &str,
            fields: serde_json::Value,
        ) -> Result<String, quipapa_shared::StoreError> {
            self.inner.append(collection, fields).await
        }

        async fn query(
            &self,
            query: &quipapa_backend::Query,
        ) -> Result<Vec<RawDocument>, quipapa_shared::StoreError> {
            self.inner.query(query).await
        }
    }

    let backend = MemoryBackend::new();
    backend
        .upsert("users", "u9", json!({ "name": "Nina", "photoUrl": "mem://n.jpg" }), false)
        .await
        .unwrap();

    let store = Arc::new(CountingStore {
        inner: backend,
        reads: AtomicUsize::new(0),
    });
    let resolver = Arc::new(ProfileResolver::new(store.clone()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let resolver = resolver.clone();
        tasks.push(tokio::spawn(async move {
            resolver.fetch(&UserId::from("u9")).await
        }));
    }
    let mut profiles = Vec::new();
    for task in tasks {
        profiles.push(task.await.unwrap());
    }

    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert!(profiles.iter().all(|p| p.display_name == "Nina"));

    // A later fetch is served from the cache.
    let again = resolver.fetch(&UserId::from("u9")).await;
    assert_eq!(again.display_name, "Nina");
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_profiles_resolve_to_the_placeholder() {
    let backend = MemoryBackend::new();
    let resolver = ProfileResolver::new(Arc::new(backend));
    let profile = resolver.fetch(&UserId::from("ghost")).await;
    assert_eq!(profile.display_name, "Usuário");
    assert_eq!(profile.photo_url, "");
}

#[tokio::test]
async fn group_timeline_carries_resolved_sender_identities() {
    let mut h = harness();
    let (alice, bruna) = two_users(&h).await;

    let convo = commands::conversations::create_group(&h.state, "Turma", &[alice.uid.clone()])
        .await
        .unwrap();

    // Drive the list once so we have the view the screen would navigate with.
    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let conversations = next_conversations(&mut h.events).await;
    let view = conversations.into_iter().find(|c| c.id == convo).unwrap();
    feed.close().await;

    // Alice has already posted, backend-side.
    h.backend
        .append(
            &convo.messages_collection(),
            json!({
                "senderId": alice.uid.as_str(),
                "text": "bem-vindos",
                "sentAt": quipapa_backend::server_timestamp(),
            }),
        )
        .await
        .unwrap();

    let message_feed = spawn_message_feed(&h.state, &view).await.unwrap();
    let items = next_timeline(&mut h.events).await;

    // Day separator plus the message, stamped with Alice's identity.
    assert_eq!(items.len(), 2);
    match &items[1] {
        quipapa_client::TimelineItem::Message {
            mine,
            sender_name,
            clock,
            ..
        } => {
            assert!(!mine);
            assert_eq!(sender_name.as_deref(), Some("Alice"));
            assert!(!clock.is_empty());
        }
        other => panic!("expected a message item, got {other:?}"),
    }

    // Bruna replies; her own item carries no sender decoration.
    commands::messaging::send_message(&h.state, &convo, "oi!")
        .await
        .unwrap();
    let items = next_timeline(&mut h.events).await;
    match items.last().unwrap() {
        quipapa_client::TimelineItem::Message {
            mine, sender_name, ..
        } => {
            assert!(mine);
            assert!(sender_name.is_none());
        }
        other => panic!("expected a message item, got {other:?}"),
    }

    message_feed.close().await;
}

#[tokio::test]
async fn direct_message_feed_resolves_the_counterpart_once() {
    let mut h = harness();
    let (alice, _bruna) = two_users(&h).await;

    let convo = commands::conversations::open_or_create_direct(&h.state, &alice.uid)
        .await
        .unwrap();
    let feed = spawn_conversation_feed(&h.state).await.unwrap();
    let conversations = next_conversations(&mut h.events).await;
    let view = conversations.into_iter().find(|c| c.id == convo).unwrap();
    feed.close().await;

    let message_feed = spawn_message_feed(&h.state, &view).await.unwrap();
    let resolved = loop {
        let event = timeout(Duration::from_secs(2), h.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed");
        if let ClientEvent::PeerResolved { display_name, .. } = event {
            break display_name;
        }
    };
    assert_eq!(resolved, "Alice");

    message_feed.close().await;

    // Sanity: the signed-in session really is Bruna's.
    assert_eq!(h.auth.current_session().unwrap().email, "bruna@example.com");
}
