//! Blob storage contract (profile photos).

use async_trait::async_trait;
use bytes::Bytes;

use quipapa_shared::BlobError;

/// Opaque reference to an uploaded blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRef(pub String);

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` at `path`, overwriting any previous blob there.
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<BlobRef, BlobError>;

    /// Publicly fetchable URL for an uploaded blob.
    async fn public_url(&self, blob: &BlobRef) -> Result<String, BlobError>;
}
