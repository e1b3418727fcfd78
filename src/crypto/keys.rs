//! X25519 key management.
//!
//! A zeroizing wrapper around a private scalar plus its public key,
//! generated from the OS RNG.

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::core::{PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};

/// A long-lived X25519 identity keypair.
///
/// Created once on first enrollment and persisted inside the session
/// credential; immutable after creation. The private scalar is zeroized on
/// drop.
#[derive(Clone)]
pub struct StaticKeypair {
    private: [u8; PRIVATE_KEY_SIZE],
    public: [u8; PUBLIC_KEY_SIZE],
}

impl StaticKeypair {
    /// Generate a fresh random identity keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    /// Reconstruct a keypair from raw key material (e.g. after restoring a
    /// session credential).
    pub fn from_bytes(private: [u8; PRIVATE_KEY_SIZE], public: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self { private, public }
    }

    /// The public key, safe to transmit.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public
    }

    /// The private scalar. Handle with care.
    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.private
    }

    /// Compute DH(self, remote_public).
    pub fn diffie_hellman(&self, remote_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        let public = PublicKey::from(*remote_public);
        *secret.diffie_hellman(&public).as_bytes()
    }
}

impl Drop for StaticKeypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl std::fmt::Debug for StaticKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeypair")
            .field("public", &hex_preview(&self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// A per-connection-attempt ephemeral X25519 keypair.
///
/// Lives only through the Noise handshake; never persisted.
pub struct EphemeralKeypair {
    private: [u8; PRIVATE_KEY_SIZE],
    public: [u8; PUBLIC_KEY_SIZE],
}

impl EphemeralKeypair {
    /// Generate a fresh ephemeral keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    /// The public key, sent as the first handshake message.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public
    }

    /// Compute DH(self, remote_public). Consumes nothing; the ephemeral
    /// secret is zeroized when this value is dropped.
    pub fn diffie_hellman(&self, remote_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        let public = PublicKey::from(*remote_public);
        *secret.diffie_hellman(&public).as_bytes()
    }
}

impl Drop for EphemeralKeypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{:02x}", b)).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypairs_are_distinct() {
        let a = StaticKeypair::generate();
        let b = StaticKeypair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn diffie_hellman_is_symmetric() {
        let a = StaticKeypair::generate();
        let b = StaticKeypair::generate();
        assert_eq!(a.diffie_hellman(b.public_key()), b.diffie_hellman(a.public_key()));
    }

    #[test]
    fn from_bytes_roundtrips() {
        let a = StaticKeypair::generate();
        let reconstructed = StaticKeypair::from_bytes(*a.private_key(), *a.public_key());
        assert_eq!(a.public_key(), reconstructed.public_key());
    }
}
