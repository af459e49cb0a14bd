// Client core for the Quipapa chat application: turns live-query snapshots
// from the managed backend into ordered, de-duplicated view state and local
// notifications, and hosts the user-gesture command layer. Rendering is the
// embedding shell's job; everything observable leaves through an injected
// EventSink.

pub mod bridge;
pub mod chats;
pub mod commands;
pub mod events;
pub mod notify;
pub mod profiles;
pub mod search;
pub mod settings;
pub mod state;
pub mod timeline;

use tracing_subscriber::{fmt, EnvFilter};

pub use bridge::{spawn_conversation_feed, spawn_message_feed, FeedHandle};
pub use chats::{ConversationReconciler, ConversationView};
pub use events::{ChannelSink, ClientEvent, EventSink};
pub use notify::DedupGate;
pub use profiles::{ProfileResolver, ResolvedProfile};
pub use search::{UserHit, UserSearch};
pub use settings::AppSettings;
pub use state::AppState;
pub use timeline::{build_timeline, decorate_group_senders, TimelineItem};

/// Initialise tracing for shells that don't bring their own subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quipapa_client=debug,quipapa_backend=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
