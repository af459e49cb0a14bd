use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Blob storage error: {0}")]
    Blob(#[from] BlobError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No active session")]
    NoSession,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid e-mail or password")]
    InvalidCredentials,

    #[error("E-mail already registered")]
    EmailInUse,

    #[error("Invalid e-mail address")]
    InvalidEmail,

    #[error("Password too weak: must be at least 6 characters")]
    WeakPassword,

    #[error("Auth provider error: {0}")]
    Provider(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Malformed document in {collection}: {reason}")]
    Malformed { collection: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Unknown blob reference: {0}")]
    UnknownRef(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Failed to schedule notification: {0}")]
    Schedule(String),

    #[error("Failed to register push token: {0}")]
    Register(String),
}
