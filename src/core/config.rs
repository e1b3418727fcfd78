//! Client configuration surface.
//!
//! A plain `ClientConfig` struct with a `Default` impl giving sensible
//! defaults, plus a builder for callers who want to override individual
//! fields.

use std::time::Duration;

use super::constants::*;
use super::error::SessionError;

/// Per-media-kind size caps, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct MediaSizeLimits {
    /// Image cap.
    pub image: usize,
    /// Video cap.
    pub video: usize,
    /// Audio cap.
    pub audio: usize,
    /// Document cap.
    pub document: usize,
    /// Small-sticker cap.
    pub sticker: usize,
}

impl Default for MediaSizeLimits {
    fn default() -> Self {
        Self {
            image: media_limits::IMAGE,
            video: media_limits::VIDEO,
            audio: media_limits::AUDIO,
            document: media_limits::DOCUMENT,
            sticker: media_limits::STICKER,
        }
    }
}

/// Platform/version triplet surfaced in the client_hello payload.
#[derive(Debug, Clone)]
pub struct BrowserIdentity {
    /// Human-readable platform name, e.g. "linux".
    pub platform: String,
    /// Browser/client name shown to the primary device.
    pub name: String,
    /// Client version string.
    pub version: String,
}

impl Default for BrowserIdentity {
    fn default() -> Self {
        Self {
            platform: "linux".into(),
            name: "companion-protocol".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Full client configuration, covering every option in the external
/// interface's configuration table.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway websocket URL.
    pub endpoint_url: String,
    /// If false, a `Reconnecting` state goes straight to `Disconnected`.
    pub auto_reconnect: bool,
    /// Initial backoff delay.
    pub reconnect_initial_delay: Duration,
    /// Backoff growth factor.
    pub reconnect_factor: f64,
    /// Maximum backoff delay.
    pub reconnect_max_delay: Duration,
    /// Maximum reconnect attempts before giving up (`None` = unbounded).
    pub reconnect_max_attempts: Option<u32>,
    /// Deadline for the `Connecting` state.
    pub connect_timeout: Duration,
    /// Deadline for the `Handshake` state.
    pub handshake_timeout: Duration,
    /// Default per-request deadline.
    pub request_default_timeout: Duration,
    /// Keepalive ping period.
    pub keepalive_interval: Duration,
    /// Silence threshold that triggers a reconnect.
    pub keepalive_grace: Duration,
    /// Per-code expiry for the scanned enrollment flow.
    pub enrollment_code_timeout: Duration,
    /// Scanned-flow code refresh cap.
    pub enrollment_max_attempts: u32,
    /// Platform/version triplet.
    pub browser_identity: BrowserIdentity,
    /// Protocol version triplet surfaced in client_hello.
    pub protocol_version: (u8, u16, u8),
    /// Per-kind media size caps.
    pub media_size_limits: MediaSizeLimits,
    /// `Origin` header value required by the gateway.
    pub origin: String,
    /// User-agent string.
    pub user_agent: String,
    /// Issuer serials the handshake's certificate chain must match.
    ///
    /// Empty means pinning is not configured for this environment and
    /// message two's certificate chain is accepted unchecked; a real
    /// deployment sets this before connecting.
    pub pinned_issuer_serials: Vec<Vec<u8>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "wss://gateway.example.invalid/ws".into(),
            auto_reconnect: true,
            reconnect_initial_delay: DEFAULT_BACKOFF_INITIAL,
            reconnect_factor: DEFAULT_BACKOFF_FACTOR,
            reconnect_max_delay: DEFAULT_BACKOFF_MAX,
            reconnect_max_attempts: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            request_default_timeout: DEFAULT_REQUEST_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_grace: DEFAULT_KEEPALIVE_GRACE,
            enrollment_code_timeout: DEFAULT_ENROLLMENT_CODE_TIMEOUT,
            enrollment_max_attempts: DEFAULT_ENROLLMENT_MAX_ATTEMPTS,
            browser_identity: BrowserIdentity::default(),
            protocol_version: (2, 3000, 0),
            media_size_limits: MediaSizeLimits::default(),
            origin: "https://gateway.example.invalid".into(),
            user_agent: format!("companion-protocol/{}", env!("CARGO_PKG_VERSION")),
            pinned_issuer_serials: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration, returning a [`SessionError::Config`] on
    /// the first problem found.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.endpoint_url.starts_with("wss://") && !self.endpoint_url.starts_with("ws://") {
            return Err(SessionError::Config(
                "endpoint_url must be a ws:// or wss:// URL".into(),
            ));
        }
        if self.reconnect_factor <= 1.0 {
            return Err(SessionError::Config(
                "reconnect_factor must be greater than 1.0".into(),
            ));
        }
        if self.reconnect_initial_delay > self.reconnect_max_delay {
            return Err(SessionError::Config(
                "reconnect_initial_delay must not exceed reconnect_max_delay".into(),
            ));
        }
        if self.enrollment_max_attempts == 0 {
            return Err(SessionError::Config(
                "enrollment_max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the gateway websocket URL.
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Override the backoff parameters.
    pub fn backoff(mut self, initial: Duration, factor: f64, max: Duration) -> Self {
        self.config.reconnect_initial_delay = initial;
        self.config.reconnect_factor = factor;
        self.config.reconnect_max_delay = max;
        self
    }

    /// Cap the number of reconnect attempts.
    pub fn reconnect_max_attempts(mut self, max: Option<u32>) -> Self {
        self.config.reconnect_max_attempts = max;
        self
    }

    /// Override the default per-request timeout.
    pub fn request_default_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_default_timeout = timeout;
        self
    }

    /// Override the keepalive interval and grace period.
    pub fn keepalive(mut self, interval: Duration, grace: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self.config.keepalive_grace = grace;
        self
    }

    /// Override the scanned enrollment code timeout and attempt cap.
    pub fn enrollment(mut self, code_timeout: Duration, max_attempts: u32) -> Self {
        self.config.enrollment_code_timeout = code_timeout;
        self.config.enrollment_max_attempts = max_attempts;
        self
    }

    /// Override the browser identity triplet.
    pub fn browser_identity(mut self, identity: BrowserIdentity) -> Self {
        self.config.browser_identity = identity;
        self
    }

    /// Override the per-kind media size limits.
    pub fn media_size_limits(mut self, limits: MediaSizeLimits) -> Self {
        self.config.media_size_limits = limits;
        self
    }

    /// Pin the set of acceptable certificate-chain issuer serials.
    pub fn pinned_issuer_serials(mut self, serials: Vec<Vec<u8>>) -> Self {
        self.config.pinned_issuer_serials = serials;
        self
    }

    /// Finalize the configuration, validating it.
    pub fn build(self) -> Result<ClientConfig, SessionError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
