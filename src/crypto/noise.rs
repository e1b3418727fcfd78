//! Noise_XX_25519_AESGCM_SHA256 handshake, initiator role only.
//!
//! The symmetric state is hand-rolled rather than delegated to a generic
//! Noise library, because the wire format needs to expose the raw transcript
//! hash as AAD and prefix message one with an extra `0x00` "no static key"
//! framing byte that a black-box handshake object would not expose.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::core::{CryptoError, HASH_SIZE};

use super::keys::{EphemeralKeypair, StaticKeypair};

const PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_AESGCM_SHA256";

/// Accumulated handshake state: transcript hash, chaining key, and the
/// current AEAD key (if any) used to encrypt/decrypt handshake payloads.
struct SymmetricState {
    h: [u8; HASH_SIZE],
    ck: [u8; HASH_SIZE],
    key: Option<[u8; 32]>,
    nonce: u64,
}

impl SymmetricState {
    fn initialize(service_tag: &[u8; 4], client_identity_pub: &[u8; 32]) -> Self {
        let h = if PROTOCOL_NAME.len() == HASH_SIZE {
            let mut out = [0u8; HASH_SIZE];
            out.copy_from_slice(PROTOCOL_NAME);
            out
        } else {
            let mut hasher = Sha256::new();
            hasher.update(PROTOCOL_NAME);
            hasher.finalize().into()
        };
        let mut state = Self {
            h,
            ck: h,
            key: None,
            nonce: 0,
        };
        state.mix_hash(service_tag);
        state.mix_hash(client_identity_pub);
        state
    }

    fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    fn mix_key(&mut self, input_key_material: &[u8]) -> Result<(), CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(&self.ck), input_key_material);
        let mut out = [0u8; 64];
        hk.expand(&[], &mut out)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        self.ck.copy_from_slice(&out[..32]);
        let mut key = [0u8; 32];
        key.copy_from_slice(&out[32..]);
        self.key = Some(key);
        self.nonce = 0;
        Ok(())
    }

    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = match self.key {
            Some(key) => {
                let ct = aead_seal(&key, self.nonce, &self.h, plaintext)?;
                self.nonce += 1;
                ct
            }
            None => plaintext.to_vec(),
        };
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let plaintext = match self.key {
            Some(key) => aead_open(&key, self.nonce, &self.h, ciphertext)?,
            None => ciphertext.to_vec(),
        };
        if self.key.is_some() {
            self.nonce += 1;
        }
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Final key split: HKDF-Expand(prk = chaining key, info = empty) -> 64
    /// bytes, `write_key(32) || read_key(32)`.
    fn split(&self) -> Result<([u8; 32], [u8; 32]), CryptoError> {
        let hk = Hkdf::<Sha256>::from_prk(&self.ck).map_err(|_| CryptoError::KeyDerivationFailed)?;
        let mut out = [0u8; 64];
        hk.expand(&[], &mut out)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        let mut write_key = [0u8; 32];
        let mut read_key = [0u8; 32];
        write_key.copy_from_slice(&out[..32]);
        read_key.copy_from_slice(&out[32..]);
        Ok((write_key, read_key))
    }
}

fn aead_seal(key: &[u8; 32], counter: u64, aad: &[u8; HASH_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    use aes_gcm::aead::{Aead, Payload};
    use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

    let cipher = Aes256Gcm::new(key.into());
    let mut nonce_bytes = [0u8; 12];
    nonce_bytes[..4].copy_from_slice(&(counter as u32).to_le_bytes());
    cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed)
}

fn aead_open(key: &[u8; 32], counter: u64, aad: &[u8; HASH_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    use aes_gcm::aead::{Aead, Payload};
    use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

    let cipher = Aes256Gcm::new(key.into());
    let mut nonce_bytes = [0u8; 12];
    nonce_bytes[..4].copy_from_slice(&(counter as u32).to_le_bytes());
    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// The two traffic keys produced by a completed handshake.
pub struct SessionKeys {
    /// Key for frames this client writes.
    pub write_key: [u8; 32],
    /// Key for frames this client reads.
    pub read_key: [u8; 32],
}

/// Initiator-side Noise_XX handshake driver.
///
/// Used exactly once per connection attempt; each of the three `step_*`
/// methods consumes `self` or `&mut self` in handshake order and is not
/// meaningful to call out of sequence.
pub struct InitiatorHandshake {
    symmetric: SymmetricState,
    ephemeral: EphemeralKeypair,
    identity: StaticKeypair,
    remote_static: Option<[u8; 32]>,
    remote_ephemeral: Option<[u8; 32]>,
}

impl InitiatorHandshake {
    /// Start a new handshake. `service_tag` is a 4-byte protocol discriminant
    /// mixed into the transcript before any messages are exchanged.
    pub fn new(identity: StaticKeypair, service_tag: [u8; 4]) -> Self {
        let symmetric = SymmetricState::initialize(&service_tag, identity.public_key());
        Self {
            symmetric,
            ephemeral: EphemeralKeypair::generate(),
            identity,
            remote_static: None,
            remote_ephemeral: None,
        }
    }

    /// Message 1 (→): `e.pub`. The caller is responsible for prefixing the
    /// wire-level `0x00` "no static key" byte — that framing marker is not
    /// part of the Noise transcript itself.
    pub fn write_message_1(&mut self) -> [u8; 32] {
        let e_pub = *self.ephemeral.public_key();
        self.symmetric.mix_hash(&e_pub);
        e_pub
    }

    /// Message 2 (←): `e.pub || ENC(s.pub) || ENC(payload)`.
    ///
    /// Returns the decrypted server payload (certificate chain + serial) for
    /// the caller to verify against the pinned issuer list.
    pub fn read_message_2(&mut self, body: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if body.len() < 32 {
            return Err(CryptoError::HandshakeRejected("message 2 too short".into()));
        }
        let mut remote_ephemeral = [0u8; 32];
        remote_ephemeral.copy_from_slice(&body[..32]);
        self.symmetric.mix_hash(&remote_ephemeral);

        let ee = self.ephemeral.diffie_hellman(&remote_ephemeral);
        self.symmetric.mix_key(&ee)?;
        self.remote_ephemeral = Some(remote_ephemeral);

        let rest = &body[32..];
        if rest.len() < 48 {
            return Err(CryptoError::HandshakeRejected("message 2 missing static/payload".into()));
        }
        let enc_static = &rest[..48];
        let enc_payload = &rest[48..];

        let remote_static_bytes = self.symmetric.decrypt_and_hash(enc_static)?;
        if remote_static_bytes.len() != 32 {
            return Err(CryptoError::HandshakeRejected("bad remote static key length".into()));
        }
        let mut remote_static = [0u8; 32];
        remote_static.copy_from_slice(&remote_static_bytes);

        let es = self.ephemeral.diffie_hellman(&remote_static);
        self.symmetric.mix_key(&es)?;

        self.remote_static = Some(remote_static);
        self.symmetric.decrypt_and_hash(enc_payload)
    }

    /// Message 3 (→): `ENC(s.pub) || ENC(client_hello_payload)`.
    ///
    /// Consumes the handshake and returns the post-handshake traffic keys
    /// alongside the wire bytes to send.
    pub fn write_message_3(mut self, client_hello_payload: &[u8]) -> Result<(Vec<u8>, SessionKeys), CryptoError> {
        if self.remote_static.is_none() {
            return Err(CryptoError::HandshakeRejected("message 2 not processed".into()));
        }
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or_else(|| CryptoError::HandshakeRejected("message 2 not processed".into()))?;

        let s_pub = *self.identity.public_key();
        let enc_static = self.symmetric.encrypt_and_hash(&s_pub)?;

        let se = self.identity.diffie_hellman(&remote_ephemeral);
        self.symmetric.mix_key(&se)?;

        let enc_payload = self.symmetric.encrypt_and_hash(client_hello_payload)?;

        let (write_key, read_key) = self.symmetric.split()?;

        let mut wire = Vec::with_capacity(enc_static.len() + enc_payload.len());
        wire.extend_from_slice(&enc_static);
        wire.extend_from_slice(&enc_payload);

        Ok((wire, SessionKeys { write_key, read_key }))
    }
}
