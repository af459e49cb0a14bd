/// Collection holding conversation summary documents
pub const CONVERSATIONS_COLLECTION: &str = "conversations";

/// Collection holding user profile documents, keyed by uid
pub const USERS_COLLECTION: &str = "users";

/// Display name shown when a participant's profile is missing or malformed
pub const UNKNOWN_DISPLAY_NAME: &str = "Usuário";

/// Debounce applied to user-search keystrokes, in milliseconds
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Maximum number of results returned by one user-search query
pub const SEARCH_RESULT_LIMIT: usize = 20;

/// Blob path prefix for profile photos (`perfil/<uid>.jpg`)
pub const PROFILE_PHOTO_PREFIX: &str = "perfil/";
