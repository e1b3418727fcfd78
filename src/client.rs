//! The public-facing client API. Wraps [`SessionHandle`] with the
//! ergonomics callers expect: owned config, an event subscription point,
//! and an optional media pipeline layered on top.

use std::time::Duration;

use crate::core::{ClientConfig, MultiplexError, SessionError};
use crate::events::{EventPublisher, EventSubscriber};
use crate::session::{SessionActor, SessionCredential, SessionHandle};

#[cfg(feature = "media")]
use std::sync::Arc;
#[cfg(feature = "media")]
use crate::core::{MediaError, MediaSizeLimits};
#[cfg(feature = "media")]
use crate::media::{self, DownloadedMedia, MediaKind, MediaTransport, UploadedMedia};

/// A connected (or connectable) companion session.
///
/// Cloning is cheap: it shares the same underlying actor and event bus as
/// the original. Dropping every clone does not stop the actor; call
/// [`CompanionClient::shutdown`] explicitly.
#[derive(Clone)]
pub struct CompanionClient {
    handle: SessionHandle,
    events: EventPublisher,
    default_request_timeout: Duration,
    #[cfg(feature = "media")]
    media_limits: MediaSizeLimits,
    #[cfg(feature = "media")]
    media_transport: Option<Arc<dyn MediaTransport>>,
}

impl CompanionClient {
    /// Validate `config`, spawn the session actor, and return a handle to
    /// it. No connection attempt is made until [`connect`](Self::connect)
    /// is called.
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        Self::with_credential(config, None)
    }

    /// Like [`new`](Self::new), restoring a previously snapshotted
    /// credential so the first connection attempt tries to resume the
    /// session instead of enrolling fresh.
    pub fn with_credential(config: ClientConfig, credential: Option<SessionCredential>) -> Result<Self, SessionError> {
        config.validate()?;
        let default_request_timeout = config.request_default_timeout;
        #[cfg(feature = "media")]
        let media_limits = config.media_size_limits;
        let events = EventPublisher::new(256);
        let handle = SessionActor::spawn(config, credential, events.clone());
        Ok(Self {
            handle,
            events,
            default_request_timeout,
            #[cfg(feature = "media")]
            media_limits,
            #[cfg(feature = "media")]
            media_transport: None,
        })
    }

    /// Attach the HTTPS collaborator used for media upload/download.
    /// Calling [`upload_media`](Self::upload_media) or
    /// [`download_media`](Self::download_media) without one returns
    /// [`MediaError::Transport`].
    #[cfg(feature = "media")]
    pub fn with_media_transport(mut self, transport: Arc<dyn MediaTransport>) -> Self {
        self.media_transport = Some(transport);
        self
    }

    /// Subscribe to the event bus. Each subscriber gets its own bounded
    /// queue; events published before this call are not replayed.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Begin connecting, or reconnecting immediately if currently idle.
    pub async fn connect(&self) {
        self.handle.connect().await;
    }

    /// Log out, clearing the credential and closing the connection.
    pub async fn logout(&self) {
        self.handle.logout().await;
    }

    /// Stop the session actor entirely. The client is unusable afterward.
    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }

    /// Send a request and await its reply, using the configured default
    /// deadline.
    pub async fn request(&self, payload: Vec<u8>) -> Result<Vec<u8>, MultiplexError> {
        self.request_with_timeout(payload, self.default_request_timeout).await
    }

    /// Send a request and await its reply with an explicit deadline.
    pub async fn request_with_timeout(&self, payload: Vec<u8>, deadline: Duration) -> Result<Vec<u8>, MultiplexError> {
        self.handle.request(payload, deadline).await
    }

    /// Ask the gateway to push a fresh scanned-image enrollment code
    /// outside the normal expiry cycle.
    pub async fn request_scanned_code(&self) {
        self.handle.request_scanned_code().await;
    }

    /// Start the typed-code enrollment flow for `destination` (digits
    /// only). The resulting code arrives as an
    /// [`crate::events::Event::EnrollmentCodeTyped`].
    pub async fn request_typed_code(&self, destination: impl Into<String>) -> Result<(), SessionError> {
        self.handle.request_typed_code(destination.into()).await
    }

    /// Snapshot the current credential, if any, for later persistence by
    /// the caller.
    pub async fn snapshot_credential(&self) -> Option<SessionCredential> {
        self.handle.snapshot_credential().await
    }

    /// Restore a previously snapshotted credential before connecting.
    pub async fn restore_credential(&self, credential: SessionCredential) {
        self.handle.restore_credential(credential).await;
    }

    /// Encrypt, size-check and upload an attachment through the configured
    /// media transport.
    #[cfg(feature = "media")]
    pub async fn upload_media(&self, kind: MediaKind, plaintext: &[u8]) -> Result<UploadedMedia, MediaError> {
        let transport = self.require_media_transport()?;
        media::upload(transport.as_ref(), &self.media_limits, kind, plaintext).await
    }

    /// Download, verify and decrypt a previously uploaded attachment.
    #[cfg(feature = "media")]
    pub async fn download_media(
        &self,
        url: &str,
        media_root: &[u8; 32],
        declared_mime: Option<&str>,
    ) -> Result<DownloadedMedia, MediaError> {
        let transport = self.require_media_transport()?;
        media::download(transport.as_ref(), url, media_root, declared_mime).await
    }

    #[cfg(feature = "media")]
    fn require_media_transport(&self) -> Result<&Arc<dyn MediaTransport>, MediaError> {
        self.media_transport
            .as_ref()
            .ok_or_else(|| MediaError::Transport("no media transport configured".into()))
    }
}
