//! Protocol constants fixed by the wire format.
//!
//! These values come directly from the external interface description and
//! MUST NOT be changed without breaking interoperability with the gateway.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// AES-GCM authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// AES-GCM nonce size.
pub const AEAD_NONCE_SIZE: usize = 12;

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 private key size.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// SHA-256 / handshake hash output size.
pub const HASH_SIZE: usize = 32;

/// Media key schedule output size: enc_key(32) || mac_key(32) || iv(16) || ref_key(32).
pub const MEDIA_KEY_MATERIAL_SIZE: usize = 112;

/// Truncated media HMAC trailer length.
///
/// Live gateways have been observed using both 10 and 16 bytes here. 10 is
/// adopted as the default; verify against a live peer before shipping to a
/// new deployment.
pub const MEDIA_MAC_SIZE: usize = 10;

/// 4-byte discriminant mixed into the Noise transcript before any handshake
/// messages are exchanged.
pub const SERVICE_TAG: [u8; 4] = *b"CMPN";

/// HKDF info string for the per-blob media key schedule.
pub const MEDIA_KEY_INFO: &[u8] = b"Companion Media Keys";

// =============================================================================
// WIRE FRAMING
// =============================================================================

/// One-time magic header written before the first frame on a fresh socket.
pub const MAGIC_HEADER: [u8; 4] = [0x57, 0x41, 0x06, 0x05];

/// Maximum payload length encodable in the 3-byte big-endian length prefix.
pub const MAX_FRAME_PAYLOAD: usize = (1 << 24) - 1;

/// Maximum plaintext a caller may hand to the transport post-handshake
/// (frame payload minus the 16-byte AEAD tag).
pub const MAX_PLAINTEXT_SIZE: usize = MAX_FRAME_PAYLOAD - AEAD_TAG_SIZE;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Deadline for each Noise handshake message.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for the websocket upgrade.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-request deadline in the multiplexer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Idle interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Silence duration (no pong) that triggers a reconnect.
pub const DEFAULT_KEEPALIVE_GRACE: Duration = Duration::from_secs(60);

/// Default expiry for a scanned enrollment code.
pub const DEFAULT_ENROLLMENT_CODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum scanned-code refresh attempts.
pub const DEFAULT_ENROLLMENT_MAX_ATTEMPTS: u32 = 5;

// =============================================================================
// BACKOFF
// =============================================================================

/// Default initial reconnect delay.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Default backoff growth factor.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;

/// Default maximum backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Jitter applied to each computed backoff delay, as a fraction either side.
pub const DEFAULT_BACKOFF_JITTER: f64 = 0.2;

// =============================================================================
// MEDIA SIZE LIMITS
// =============================================================================

/// Default per-kind media size caps.
pub mod media_limits {
    /// Image cap: 16 MiB.
    pub const IMAGE: usize = 16 * 1024 * 1024;
    /// Video cap: 100 MiB.
    pub const VIDEO: usize = 100 * 1024 * 1024;
    /// Audio cap: 100 MiB.
    pub const AUDIO: usize = 100 * 1024 * 1024;
    /// Document cap: 100 MiB.
    pub const DOCUMENT: usize = 100 * 1024 * 1024;
    /// Small-sticker cap: 1 MiB.
    pub const STICKER: usize = 1024 * 1024;
}
