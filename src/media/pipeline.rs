//! Orchestrates the media cipher primitives with a caller-supplied
//! [`MediaTransport`] and the configured per-kind size limits.

use sha2::{Digest, Sha256};

use crate::core::{MediaError, MediaSizeLimits};
use crate::crypto::{decrypt_downloaded, encrypt_for_upload, fill_random, sniff_mime, MediaKeys};

use super::transport::MediaTransport;

/// Which size cap applies to a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
    /// Audio clip or voice note.
    Audio,
    /// Arbitrary document.
    Document,
    /// Small sticker image.
    Sticker,
}

impl MediaKind {
    fn limit(self, limits: &MediaSizeLimits) -> usize {
        match self {
            MediaKind::Image => limits.image,
            MediaKind::Video => limits.video,
            MediaKind::Audio => limits.audio,
            MediaKind::Document => limits.document,
            MediaKind::Sticker => limits.sticker,
        }
    }
}

/// Everything the caller needs to reference an uploaded blob later: the
/// collaborator-issued URL, the per-blob key root, content hashes for
/// integrity bookkeeping, and the plaintext size.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    /// URL returned by the HTTPS collaborator.
    pub url: String,
    /// The 32-byte root the peer needs to derive the same key schedule.
    pub media_root: [u8; 32],
    /// SHA-256 of the plaintext.
    pub sha256_plaintext: [u8; 32],
    /// SHA-256 of the uploaded (encrypted) buffer.
    pub sha256_upload_buffer: [u8; 32],
    /// Plaintext size in bytes.
    pub size: usize,
}

/// A successfully downloaded and decrypted blob.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    /// Decrypted plaintext.
    pub plaintext: Vec<u8>,
    /// Detected or caller-supplied MIME type.
    pub mime_type: String,
}

/// Encrypts, size-checks and uploads `plaintext` of the given `kind`.
pub async fn upload(
    transport: &dyn MediaTransport,
    limits: &MediaSizeLimits,
    kind: MediaKind,
    plaintext: &[u8],
) -> Result<UploadedMedia, MediaError> {
    let limit = kind.limit(limits);
    if plaintext.len() > limit {
        return Err(MediaError::SizeExceeded { actual: plaintext.len(), limit });
    }

    let mut media_root = [0u8; 32];
    fill_random(&mut media_root);
    let keys = MediaKeys::derive(&media_root).map_err(|_| MediaError::MalformedBuffer)?;
    let buffer = encrypt_for_upload(&keys, plaintext);

    let sha256_plaintext = Sha256::digest(plaintext).into();
    let sha256_upload_buffer = Sha256::digest(&buffer).into();
    let size = plaintext.len();

    let url = transport.upload(buffer).await?;

    Ok(UploadedMedia {
        url,
        media_root,
        sha256_plaintext,
        sha256_upload_buffer,
        size,
    })
}

/// Downloads, verifies and decrypts the blob at `url` encrypted under
/// `media_root`. `declared_mime` overrides MIME sniffing when the peer
/// supplied one.
pub async fn download(
    transport: &dyn MediaTransport,
    url: &str,
    media_root: &[u8; 32],
    declared_mime: Option<&str>,
) -> Result<DownloadedMedia, MediaError> {
    let buffer = transport.download(url).await?;
    let plaintext = decrypt_downloaded(media_root, &buffer)?;
    let mime_type = declared_mime
        .map(str::to_string)
        .unwrap_or_else(|| sniff_mime(&plaintext).to_string());
    Ok(DownloadedMedia { plaintext, mime_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct InMemoryTransport {
        store: Mutex<Option<Vec<u8>>>,
    }

    impl InMemoryTransport {
        fn new() -> Self {
            Self { store: Mutex::new(None) }
        }
    }

    #[async_trait::async_trait]
    impl MediaTransport for InMemoryTransport {
        async fn upload(&self, buffer: Vec<u8>) -> Result<String, MediaError> {
            *self.store.lock().unwrap() = Some(buffer);
            Ok("mem://blob".into())
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, MediaError> {
            self.store.lock().unwrap().clone().ok_or(MediaError::MalformedBuffer)
        }
    }

    #[tokio::test]
    async fn upload_then_download_roundtrips() {
        let transport = InMemoryTransport::new();
        let limits = MediaSizeLimits::default();
        let plaintext = b"an attachment".to_vec();

        let uploaded = upload(&transport, &limits, MediaKind::Image, &plaintext).await.unwrap();
        assert_eq!(uploaded.size, plaintext.len());

        let downloaded = download(&transport, &uploaded.url, &uploaded.media_root, None).await.unwrap();
        assert_eq!(downloaded.plaintext, plaintext);
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected() {
        let transport = InMemoryTransport::new();
        let mut limits = MediaSizeLimits::default();
        limits.sticker = 4;
        let plaintext = b"too big for a sticker".to_vec();

        let result = upload(&transport, &limits, MediaKind::Sticker, &plaintext).await;
        assert!(matches!(result, Err(MediaError::SizeExceeded { .. })));
    }
}
