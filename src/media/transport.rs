//! The HTTPS collaborator contract. No concrete client lives in this
//! crate; callers supply their own `MediaTransport` impl (e.g. wrapping
//! `reqwest`), keeping this crate free of an HTTP client dependency.

use async_trait::async_trait;

use crate::core::MediaError;

/// Uploads and downloads opaque ciphertext blobs over HTTPS.
///
/// Implementations see only the already-encrypted `iv || ciphertext ||
/// mac10` buffer; the media cipher pipeline never hands them plaintext.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Upload an encrypted blob, returning the URL the peer can later use
    /// to fetch it.
    async fn upload(&self, buffer: Vec<u8>) -> Result<String, MediaError>;

    /// Download the encrypted blob at `url`.
    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}
