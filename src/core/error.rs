//! Error taxonomy for companion-protocol.
//!
//! Each layer defines its own error enum; all of them are aggregated into
//! the top-level [`Error`] via `#[from]`, mirroring how a caller only ever
//! needs to match on one type regardless of which layer failed.

use thiserror::Error;

/// Errors from the Noise handshake and post-handshake cipher states.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A handshake message failed to parse, decrypt, or authenticate.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// No handshake message arrived within the configured deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The peer's certificate chain did not match the pinned issuer serial.
    #[error("certificate pinning failed: {0}")]
    CertificateRejected(String),

    /// AEAD encryption failed (should not happen with well-formed input).
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed: bad tag, wrong key, or corrupted ciphertext.
    #[error("AEAD decryption failed")]
    DecryptionFailed,

    /// A cipher state's nonce counter is about to wrap; the connection must close.
    #[error("nonce counter exhausted")]
    CounterExhausted,

    /// HKDF expansion failed (malformed salt/length, never expected in practice).
    #[error("key derivation failed")]
    KeyDerivationFailed,
}

/// Errors from the frame codec and websocket connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying websocket I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// A length prefix exceeded the 2^24-1 frame size limit.
    #[error("malformed frame length")]
    MalformedLength,

    /// The peer closed the socket.
    #[error("socket closed by peer")]
    Closed,
}

/// Errors from the session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Options supplied at construction were invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No credential is available and the caller has not enrolled.
    #[error("authentication required: no session credential")]
    AuthenticationRequired,

    /// The connection is not currently usable.
    #[error("disconnected")]
    Disconnected,
}

/// Errors from the request multiplexer.
#[derive(Debug, Error)]
pub enum MultiplexError {
    /// The request's deadline elapsed before a reply arrived.
    #[error("request timed out")]
    Timeout,

    /// The connection dropped while the request was pending.
    #[error("disconnected")]
    Disconnected,

    /// The caller cancelled their wait.
    #[error("cancelled")]
    Cancelled,
}

/// Errors from the enrollment flows.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    /// The scanned-code flow exhausted its retry budget.
    #[error("enrollment exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The typed-code flow's code expired with no success and no auto-retry.
    #[error("enrollment code expired")]
    CodeExpired,

    /// The destination identifier supplied by the caller was not digits-only.
    #[error("invalid destination identifier: {0}")]
    InvalidDestination(String),
}

/// Errors from the media cipher pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The truncated HMAC trailer did not match on download.
    #[error("media authentication failed")]
    AuthenticationFailed,

    /// The plaintext or ciphertext exceeded the configured size limit.
    #[error("media size exceeded: {actual} > {limit} bytes")]
    SizeExceeded {
        /// Size that was rejected.
        actual: usize,
        /// Configured limit for the media kind.
        limit: usize,
    },

    /// The upload/download collaborator reported a failure.
    #[error("media transport error: {0}")]
    Transport(String),

    /// A ciphertext buffer was too short to contain iv + mac trailer.
    #[error("malformed media buffer")]
    MalformedBuffer,
}

/// Top-level error type returned from the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`CryptoError`].
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// See [`TransportError`].
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// See [`SessionError`].
    #[error(transparent)]
    Session(#[from] SessionError),

    /// See [`MultiplexError`].
    #[error(transparent)]
    Multiplex(#[from] MultiplexError),

    /// See [`EnrollmentError`].
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    /// See [`MediaError`].
    #[error(transparent)]
    Media(#[from] MediaError),

    /// A request or state-machine deadline elapsed outside of the
    /// multiplexer (e.g. connect or handshake timeouts).
    #[error("operation timed out")]
    Timeout,

    /// The caller's await was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}
