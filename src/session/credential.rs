//! The opaque session credential: everything needed to restore a session
//! without repeating enrollment.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::SessionError;
use crate::crypto::StaticKeypair;

/// Produced by successful enrollment, consumed by the restore-session path.
/// Exclusively owned by the session state machine; serialized only when the
/// caller asks to snapshot it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionCredential {
    identity_private: [u8; 32],
    identity_public: [u8; 32],
    /// Registration identifier assigned by the gateway.
    pub registration_id: String,
    /// Server-provided bearer token, also used for HTTPS media requests.
    pub server_token: String,
    /// Traffic write key captured immediately after the handshake's last
    /// message.
    pub write_key: [u8; 32],
    /// Traffic read key captured immediately after the handshake's last
    /// message.
    pub read_key: [u8; 32],
    /// Wall-clock seconds since the Unix epoch of last successful use.
    pub last_used_unix: u64,
}

impl SessionCredential {
    /// Construct a fresh credential at the moment enrollment succeeds.
    pub fn new(
        identity: &StaticKeypair,
        registration_id: String,
        server_token: String,
        write_key: [u8; 32],
        read_key: [u8; 32],
    ) -> Self {
        Self {
            identity_private: *identity.private_key(),
            identity_public: *identity.public_key(),
            registration_id,
            server_token,
            write_key,
            read_key,
            last_used_unix: now_unix(),
        }
    }

    /// Reconstruct the identity keypair for use in a future handshake.
    pub fn identity_keypair(&self) -> StaticKeypair {
        StaticKeypair::from_bytes(self.identity_private, self.identity_public)
    }

    /// Stamp `last_used_unix` to the current time.
    pub fn touch(&mut self) {
        self.last_used_unix = now_unix();
    }

    /// Serialize into the opaque credential blob callers may persist.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        bincode::serialize(self).map_err(|e| SessionError::Config(format!("credential serialization failed: {e}")))
    }

    /// Deserialize a previously snapshotted credential blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        bincode::deserialize(bytes).map_err(|e| SessionError::Config(format!("credential deserialization failed: {e}")))
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let public_hex: String = self
            .identity_public
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        f.debug_struct("SessionCredential")
            .field("registration_id", &self.registration_id)
            .field("last_used_unix", &self.last_used_unix)
            .field("identity_public", &public_hex)
            .finish_non_exhaustive()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock predates the Unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let identity = StaticKeypair::generate();
        let credential = SessionCredential::new(
            &identity,
            "reg-123".into(),
            "token-abc".into(),
            [0x11; 32],
            [0x22; 32],
        );
        let bytes = credential.to_bytes().unwrap();
        let restored = SessionCredential::from_bytes(&bytes).unwrap();
        assert_eq!(restored.registration_id, "reg-123");
        assert_eq!(restored.server_token, "token-abc");
        assert_eq!(restored.write_key, [0x11; 32]);
        assert_eq!(
            restored.identity_keypair().public_key(),
            identity.public_key()
        );
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(SessionCredential::from_bytes(b"not a credential").is_err());
    }
}
