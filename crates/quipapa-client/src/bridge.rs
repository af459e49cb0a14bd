//! Feed bridge: pumps live-query snapshots through the sync core and emits
//! typed events to the embedding shell.
//!
//! Each feed is scoped to the screen that opened it. The returned handle
//! cancels the backend subscription and tears the pump task down together;
//! dropping the handle does the same, so a feed can never outlive its
//! owner.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use quipapa_backend::{Query, Subscription};
use quipapa_shared::{ChatError, ConversationKind, Message, UserId};

use crate::chats::{ConversationReconciler, ConversationView};
use crate::events::{ClientEvent, EventSink};
use crate::notify::DedupGate;
use crate::state::AppState;
use crate::timeline::{build_timeline, decorate_group_senders};

/// Handle to a running feed. `close` for deterministic teardown, or just
/// drop it.
pub struct FeedHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Stop the feed and wait for the pump task to finish.
    pub async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Watch the signed-in user's conversation list. Every delivery replaces
/// the previous list wholesale and may fire local notifications for
/// externally-originated summary changes.
pub async fn spawn_conversation_feed(state: &Arc<AppState>) -> Result<FeedHandle, ChatError> {
    let session = state.session()?;
    let subscription = state
        .live
        .subscribe(Query::conversations_of(&session.uid))
        .await?;

    let gate = DedupGate::new(
        state.notifier.clone(),
        session.uid.clone(),
        state.notifications_enabled.clone(),
    );
    let reconciler = ConversationReconciler::new(session.uid.clone(), state.resolver.clone(), gate);

    info!(user = %session.uid, "Conversation feed started");
    let (stop_tx, stop_rx) = oneshot::channel();
    let sink = state.sink.clone();
    let task = tokio::spawn(conversation_loop(subscription, reconciler, sink, stop_rx));

    Ok(FeedHandle {
        stop: Some(stop_tx),
        task: Some(task),
    })
}

async fn conversation_loop(
    mut subscription: Subscription,
    mut reconciler: ConversationReconciler,
    sink: Arc<dyn EventSink>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            delivery = subscription.recv() => match delivery {
                Some(snapshot) => {
                    let conversations = reconciler.apply(&snapshot).await;
                    debug!(count = conversations.len(), "Conversation list reconciled");
                    sink.emit(ClientEvent::ConversationsUpdated { conversations });
                }
                None => {
                    warn!("Conversation feed closed by the backend");
                    break;
                }
            }
        }
    }
    subscription.cancel();
}

/// Watch one conversation's message timeline. For direct conversations the
/// counterpart's header identity is resolved once, on activation, not per
/// message.
pub async fn spawn_message_feed(
    state: &Arc<AppState>,
    conversation: &ConversationView,
) -> Result<FeedHandle, ChatError> {
    let session = state.session()?;
    let subscription = state.live.subscribe(Query::messages_of(&conversation.id)).await?;

    if conversation.kind == ConversationKind::Direct {
        if let Some(other) =
            crate::profiles::ProfileResolver::others(&conversation.participants, &session.uid)
                .into_iter()
                .next()
        {
            let profile = state.resolver.fetch(&other).await;
            state.sink.emit(ClientEvent::PeerResolved {
                conversation_id: conversation.id.clone(),
                display_name: profile.display_name,
                photo_url: profile.photo_url,
            });
        }
    }

    info!(conversation = %conversation.id, "Message feed started");
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(message_loop(
        subscription,
        conversation.id.clone(),
        conversation.kind,
        session.uid,
        state.resolver.clone(),
        state.sink.clone(),
        stop_rx,
    ));

    Ok(FeedHandle {
        stop: Some(stop_tx),
        task: Some(task),
    })
}

async fn message_loop(
    mut subscription: Subscription,
    conversation_id: quipapa_shared::ConversationId,
    kind: ConversationKind,
    local_uid: UserId,
    resolver: Arc<crate::profiles::ProfileResolver>,
    sink: Arc<dyn EventSink>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            delivery = subscription.recv() => match delivery {
                Some(snapshot) => {
                    let messages: Vec<Message> =
                        snapshot.docs.iter().map(Message::from_raw).collect();
                    let mut items = build_timeline(&messages, &local_uid);
                    if kind == ConversationKind::Group {
                        decorate_group_senders(&mut items, &resolver).await;
                    }
                    sink.emit(ClientEvent::TimelineUpdated {
                        conversation_id: conversation_id.clone(),
                        items,
                    });
                }
                None => {
                    warn!(conversation = %conversation_id, "Message feed closed by the backend");
                    break;
                }
            }
        }
    }
    subscription.cancel();
}
