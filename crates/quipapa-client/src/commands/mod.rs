//! User-gesture command layer. Errors here surface to the caller; the
//! reactive paths in `bridge`/`chats` degrade silently instead.

pub mod auth;
pub mod conversations;
pub mod messaging;
pub mod profile;
