//! Issuer-serial pinning for the certificate chain carried in handshake
//! message two.
//!
//! The gateway's identity is not validated via the host's trust store; this
//! client only trusts a compile-time pinned list of issuer serials. Anything
//! else is a fatal handshake rejection.

use crate::core::CryptoError;

/// One parsed entry from the certificate chain payload: an issuer serial and
/// the raw certificate bytes that followed it on the wire.
#[derive(Debug, Clone)]
pub struct CertificateEntry {
    /// Issuer serial number, as presented on the wire.
    pub issuer_serial: Vec<u8>,
    /// Raw DER bytes of the certificate itself.
    pub der: Vec<u8>,
}

/// A compile-time pinned set of acceptable issuer serials.
pub struct PinnedIssuers {
    serials: Vec<Vec<u8>>,
}

impl PinnedIssuers {
    /// Build a pin set from a fixed list of serials.
    pub fn new(serials: Vec<Vec<u8>>) -> Self {
        Self { serials }
    }

    /// Verify that at least one certificate in `chain` was issued by a
    /// pinned serial. Returns the matching entry.
    pub fn verify<'a>(&self, chain: &'a [CertificateEntry]) -> Result<&'a CertificateEntry, CryptoError> {
        chain
            .iter()
            .find(|entry| self.serials.iter().any(|pinned| pinned == &entry.issuer_serial))
            .ok_or_else(|| CryptoError::CertificateRejected("no certificate matched a pinned issuer serial".into()))
    }
}

/// Parse the raw server payload from handshake message two into a chain of
/// `{issuer_serial_len: u16 BE}{issuer_serial}{cert_len: u32 BE}{cert_der}`
/// entries.
pub fn parse_certificate_chain(payload: &[u8]) -> Result<Vec<CertificateEntry>, CryptoError> {
    let mut entries = Vec::new();
    let mut cursor = payload;
    while !cursor.is_empty() {
        if cursor.len() < 2 {
            return Err(CryptoError::CertificateRejected("truncated issuer serial length".into()));
        }
        let serial_len = u16::from_be_bytes([cursor[0], cursor[1]]) as usize;
        cursor = &cursor[2..];
        if cursor.len() < serial_len {
            return Err(CryptoError::CertificateRejected("truncated issuer serial".into()));
        }
        let issuer_serial = cursor[..serial_len].to_vec();
        cursor = &cursor[serial_len..];

        if cursor.len() < 4 {
            return Err(CryptoError::CertificateRejected("truncated certificate length".into()));
        }
        let cert_len = u32::from_be_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]) as usize;
        cursor = &cursor[4..];
        if cursor.len() < cert_len {
            return Err(CryptoError::CertificateRejected("truncated certificate body".into()));
        }
        let der = cursor[..cert_len].to_vec();
        cursor = &cursor[cert_len..];

        entries.push(CertificateEntry { issuer_serial, der });
    }
    if entries.is_empty() {
        return Err(CryptoError::CertificateRejected("empty certificate chain".into()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_entry(serial: &[u8], der: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(serial.len() as u16).to_be_bytes());
        out.extend_from_slice(serial);
        out.extend_from_slice(&(der.len() as u32).to_be_bytes());
        out.extend_from_slice(der);
        out
    }

    #[test]
    fn parses_single_entry() {
        let payload = encode_entry(b"serial-1", b"der-bytes");
        let chain = parse_certificate_chain(&payload).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].issuer_serial, b"serial-1");
        assert_eq!(chain[0].der, b"der-bytes");
    }

    #[test]
    fn parses_multiple_entries() {
        let mut payload = encode_entry(b"a", b"cert-a");
        payload.extend(encode_entry(b"b", b"cert-b"));
        let chain = parse_certificate_chain(&payload).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut payload = encode_entry(b"serial", b"der");
        payload.truncate(payload.len() - 1);
        assert!(parse_certificate_chain(&payload).is_err());
    }

    #[test]
    fn pinned_match_succeeds() {
        let payload = encode_entry(b"trusted-serial", b"cert");
        let chain = parse_certificate_chain(&payload).unwrap();
        let pins = PinnedIssuers::new(vec![b"trusted-serial".to_vec()]);
        assert!(pins.verify(&chain).is_ok());
    }

    #[test]
    fn unpinned_serial_is_rejected() {
        let payload = encode_entry(b"unknown-serial", b"cert");
        let chain = parse_certificate_chain(&payload).unwrap();
        let pins = PinnedIssuers::new(vec![b"trusted-serial".to_vec()]);
        assert!(pins.verify(&chain).is_err());
    }
}
