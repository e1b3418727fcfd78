//! Post-handshake cipher state.
//!
//! A `CipherState` wraps one AES-256-GCM key plus a strictly monotonic
//! nonce counter. Two independent instances exist after a handshake — one
//! for writes, one for reads — each starting its counter at zero. Rekeying
//! is never performed: if a counter would wrap, the connection is closed.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::core::CryptoError;

/// One direction's symmetric key plus its nonce counter.
pub struct CipherState {
    cipher: Aes256Gcm,
    counter: u64,
}

impl CipherState {
    /// Construct a cipher state from a 32-byte traffic key, counter at zero.
    pub fn new(key: [u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { cipher, counter: 0 }
    }

    /// Current counter value, i.e. the number of frames already sealed.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Encrypt `plaintext` with the given AAD, consuming the next nonce.
    ///
    /// Returns `ciphertext || 16-byte tag`.
    pub fn encrypt(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce_bytes = self.next_nonce()?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        self.cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt `ciphertext_and_tag` with the given AAD, consuming the next
    /// nonce (i.e. the caller must feed frames in wire order).
    pub fn decrypt(&mut self, aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce_bytes = self.next_nonce()?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext_and_tag,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Build the next 12-byte nonce (LE counter in the low 4 bytes, upper 8
    /// zero) and advance the counter.
    fn next_nonce(&mut self) -> Result<[u8; 12], CryptoError> {
        if self.counter == u64::MAX {
            return Err(CryptoError::CounterExhausted);
        }
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&(self.counter as u32).to_le_bytes());
        self.counter += 1;
        Ok(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_encrypt_decrypt() {
        let key = [0x11u8; 32];
        let mut write = CipherState::new(key);
        let mut read = CipherState::new(key);

        let ct = write.encrypt(b"", b"hello").unwrap();
        let pt = read.decrypt(b"", &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn counter_advances_monotonically() {
        let mut cs = CipherState::new([0x22u8; 32]);
        assert_eq!(cs.counter(), 0);
        let _ = cs.encrypt(b"", b"a").unwrap();
        assert_eq!(cs.counter(), 1);
        let _ = cs.encrypt(b"", b"b").unwrap();
        assert_eq!(cs.counter(), 2);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = [0x33u8; 32];
        let mut write = CipherState::new(key);
        let mut read = CipherState::new(key);

        let mut ct = write.encrypt(b"", b"hello").unwrap();
        *ct.last_mut().unwrap() ^= 0x01;
        assert!(read.decrypt(b"", &ct).is_err());
    }

    #[test]
    fn out_of_order_nonce_fails_to_decrypt() {
        // The reader advances its own counter independently of the writer's;
        // if a frame is skipped the reader's next nonce no longer matches.
        let key = [0x44u8; 32];
        let mut write = CipherState::new(key);
        let mut read = CipherState::new(key);

        let _first = write.encrypt(b"", b"a").unwrap();
        let second = write.encrypt(b"", b"b").unwrap();
        assert!(read.decrypt(b"", &second).is_err());
    }
}
