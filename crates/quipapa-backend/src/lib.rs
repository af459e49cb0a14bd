// Contracts for the external managed backend (document database with live
// queries, authentication, blob storage, platform notifications), plus a
// complete in-process implementation for tests and local development.
//
// The client core never talks to a concrete service directly: every
// collaborator is injected as one of these traits.

pub mod auth;
pub mod blob;
pub mod memory;
pub mod notify;
pub mod store;

pub use auth::{AuthService, Session, SessionCallback};
pub use blob::{BlobRef, BlobStore};
pub use memory::{DeliveredNotification, MemoryAuth, MemoryBackend, MemoryBlobs, MemoryNotifier};
pub use notify::Notifier;
pub use store::{
    server_timestamp, Constraint, DocumentStore, LiveQueries, Query, Snapshot, Subscription,
};
