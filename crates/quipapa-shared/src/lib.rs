// Domain types shared by the backend contracts and the client core.

pub mod constants;
pub mod documents;
pub mod error;
pub mod time;
pub mod types;

pub use documents::{Conversation, Message, RawDocument, UserProfile};
pub use error::{AuthError, BlobError, ChatError, NotifyError, StoreError};
pub use types::{ConversationId, ConversationKind, UserId};
