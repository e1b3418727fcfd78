//! Media blob cipher pipeline: per-blob key schedule, AES-256-CBC encryption
//! and a truncated HMAC-SHA256 authentication trailer.
//!
//! Independent of the transport cipher states — a media key is derived fresh
//! for every blob and discarded once the upload or download completes.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::core::{CryptoError, MediaError, MEDIA_KEY_INFO, MEDIA_MAC_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// The expanded per-blob key material: `enc_key(32) || mac_key(32) || iv(16) || ref_key(32)`.
pub struct MediaKeys {
    enc_key: [u8; 32],
    mac_key: [u8; 32],
    iv: [u8; 16],
    /// Unused by this pipeline directly; kept for callers that need to
    /// derive a CDN reference tag from the same root.
    pub ref_key: [u8; 32],
}

impl MediaKeys {
    /// Derive the key schedule from a fresh 32-byte media root.
    pub fn derive(media_root: &[u8; 32]) -> Result<Self, CryptoError> {
        let hk = Hkdf::<Sha256>::new(None, media_root);
        let mut out = [0u8; 112];
        hk.expand(MEDIA_KEY_INFO, &mut out)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        let mut enc_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        let mut iv = [0u8; 16];
        let mut ref_key = [0u8; 32];
        enc_key.copy_from_slice(&out[0..32]);
        mac_key.copy_from_slice(&out[32..64]);
        iv.copy_from_slice(&out[64..80]);
        ref_key.copy_from_slice(&out[80..112]);

        Ok(Self { enc_key, mac_key, iv, ref_key })
    }
}

/// Encrypt `plaintext` for upload. Returns `iv || ciphertext || mac10`.
pub fn encrypt_for_upload(keys: &MediaKeys, plaintext: &[u8]) -> Vec<u8> {
    let ciphertext = Aes256CbcEnc::new(&keys.enc_key.into(), &keys.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(&keys.mac_key).expect("HMAC accepts any key length");
    mac.update(&keys.iv);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut buffer = Vec::with_capacity(16 + ciphertext.len() + MEDIA_MAC_SIZE);
    buffer.extend_from_slice(&keys.iv);
    buffer.extend_from_slice(&ciphertext);
    buffer.extend_from_slice(&tag[..MEDIA_MAC_SIZE]);
    buffer
}

/// Verify and decrypt a downloaded buffer of the form `iv || ciphertext || mac10`.
pub fn decrypt_downloaded(media_root: &[u8; 32], buffer: &[u8]) -> Result<Vec<u8>, MediaError> {
    if buffer.len() < 16 + MEDIA_MAC_SIZE {
        return Err(MediaError::MalformedBuffer);
    }
    let iv = &buffer[..16];
    let mac10 = &buffer[buffer.len() - MEDIA_MAC_SIZE..];
    let ciphertext = &buffer[16..buffer.len() - MEDIA_MAC_SIZE];

    let keys = MediaKeys::derive(media_root).map_err(|_| MediaError::MalformedBuffer)?;

    let mut mac = HmacSha256::new_from_slice(&keys.mac_key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    let expected = mac.finalize().into_bytes();
    if expected[..MEDIA_MAC_SIZE].ct_eq(mac10).unwrap_u8() != 1 {
        return Err(MediaError::AuthenticationFailed);
    }

    Aes256CbcDec::new(&keys.enc_key.into(), &keys.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| MediaError::MalformedBuffer)
}

/// Guess a MIME type from a buffer's leading bytes, used when the caller
/// does not supply one for a downloaded blob.
pub fn sniff_mime(plaintext: &[u8]) -> &'static str {
    match plaintext {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [0x00, 0x00, 0x00, _, b'f', b't', b'y', b'p', ..] => "video/mp4",
        [b'I', b'D', b'3', ..] => "audio/mpeg",
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        _ => "application/octet-stream",
    }
}
