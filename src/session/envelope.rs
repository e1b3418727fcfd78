//! This crate's own minimal framing for demultiplexing decrypted
//! post-handshake payloads.
//!
//! The wire format leaves application envelopes opaque; this layer still
//! needs to tell a tagged reply apart from an unsolicited push, so it
//! prefixes every payload it writes, and expects the same prefix on every
//! payload it reads, with a one-byte kind discriminant.

use crate::core::TransportError;

const KIND_REQUEST: u8 = 0;
const KIND_REPLY: u8 = 1;
const KIND_ENVELOPE: u8 = 2;
const KIND_RECEIPT: u8 = 3;
const KIND_ENROLLMENT_CODE_IMAGE: u8 = 4;
const KIND_ENROLLMENT_CODE_TYPED: u8 = 5;
const KIND_ENROLLMENT_SUCCESS: u8 = 6;
const KIND_ENROLLMENT_REFRESH_REQUEST: u8 = 7;

/// A decoded inbound message, demultiplexed by kind.
pub enum InboundMessage {
    /// A reply correlated to one of our own tagged requests.
    Reply { tag: String, body: Vec<u8> },
    /// An unsolicited application envelope.
    Envelope(Vec<u8>),
    /// A delivery/read receipt.
    Receipt(Vec<u8>),
    /// A scanned-image enrollment code push.
    EnrollmentCodeImage {
        payload: Vec<u8>,
        attempt: u32,
        max_attempts: u32,
        expires_at_unix: u64,
    },
    /// A typed-code enrollment reply.
    EnrollmentCodeTyped { code: String, expires_at_unix: u64 },
    /// Enrollment succeeded.
    EnrollmentSuccess {
        registration_id: String,
        server_token: String,
    },
}

fn read_tagged(body: &[u8]) -> Result<(String, Vec<u8>), TransportError> {
    if body.len() < 2 {
        return Err(TransportError::Io("truncated tag length".into()));
    }
    let tag_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    if body.len() < 2 + tag_len {
        return Err(TransportError::Io("truncated tag".into()));
    }
    let tag = String::from_utf8(body[2..2 + tag_len].to_vec())
        .map_err(|_| TransportError::Io("tag is not valid UTF-8".into()))?;
    Ok((tag, body[2 + tag_len..].to_vec()))
}

fn write_tagged(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + tag.len() + payload.len());
    out.extend_from_slice(&(tag.len() as u16).to_be_bytes());
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Build the plaintext for an outbound tagged request.
pub fn encode_request(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![KIND_REQUEST];
    out.extend_from_slice(&write_tagged(tag, payload));
    out
}

/// Build the plaintext asking the gateway to push a fresh scanned-image
/// enrollment code. Carries no body and no tag: the refreshed code arrives
/// later as an ordinary unsolicited [`InboundMessage::EnrollmentCodeImage`].
pub fn encode_enrollment_refresh_request() -> Vec<u8> {
    vec![KIND_ENROLLMENT_REFRESH_REQUEST]
}

fn decode_code_and_expiry(body: &[u8]) -> Result<(String, u64), TransportError> {
    if body.len() < 4 {
        return Err(TransportError::Io("truncated code/expiry".into()));
    }
    let expires_at_unix = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as u64;
    let code = String::from_utf8(body[4..].to_vec())
        .map_err(|_| TransportError::Io("code is not valid UTF-8".into()))?;
    Ok((code, expires_at_unix))
}

/// Parse a tagged reply body for a typed-code enrollment request, which
/// reuses the scanned-flow's `{expires_at: u32 BE}{code: utf8}` layout.
pub fn parse_typed_code_reply(body: &[u8]) -> Result<(String, u64), TransportError> {
    decode_code_and_expiry(body)
}

/// Parse a decrypted post-handshake payload into its demultiplexed kind.
pub fn decode_inbound(payload: &[u8]) -> Result<InboundMessage, TransportError> {
    let (kind, body) = payload
        .split_first()
        .ok_or_else(|| TransportError::Io("empty inbound payload".into()))?;

    match *kind {
        KIND_REPLY => {
            let (tag, reply_body) = read_tagged(body)?;
            Ok(InboundMessage::Reply { tag, body: reply_body })
        }
        KIND_ENVELOPE => Ok(InboundMessage::Envelope(body.to_vec())),
        KIND_RECEIPT => Ok(InboundMessage::Receipt(body.to_vec())),
        KIND_ENROLLMENT_CODE_IMAGE => {
            if body.len() < 12 {
                return Err(TransportError::Io("truncated enrollment code image".into()));
            }
            let attempt = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            let max_attempts = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
            let expires_at_unix = u32::from_be_bytes([body[8], body[9], body[10], body[11]]) as u64;
            Ok(InboundMessage::EnrollmentCodeImage {
                payload: body[12..].to_vec(),
                attempt,
                max_attempts,
                expires_at_unix,
            })
        }
        KIND_ENROLLMENT_CODE_TYPED => {
            let (code, expires_at_unix) = decode_code_and_expiry(body)?;
            Ok(InboundMessage::EnrollmentCodeTyped { code, expires_at_unix })
        }
        KIND_ENROLLMENT_SUCCESS => {
            let (registration_id, rest) = read_tagged(body)?;
            let server_token = String::from_utf8(rest).map_err(|_| TransportError::Io("token is not valid UTF-8".into()))?;
            Ok(InboundMessage::EnrollmentSuccess {
                registration_id,
                server_token,
            })
        }
        other => Err(TransportError::Io(format!("unknown inbound kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_as_reply() {
        let request = encode_request("tag-1", b"body");
        // Flip the kind byte as the peer would to answer.
        let mut reply = request.clone();
        reply[0] = KIND_REPLY;
        match decode_inbound(&reply).unwrap() {
            InboundMessage::Reply { tag, body } => {
                assert_eq!(tag, "tag-1");
                assert_eq!(body, b"body");
            }
            _ => panic!("expected Reply"),
        }
    }

    #[test]
    fn envelope_is_opaque() {
        let mut payload = vec![KIND_ENVELOPE];
        payload.extend_from_slice(b"whatever bytes");
        match decode_inbound(&payload).unwrap() {
            InboundMessage::Envelope(bytes) => assert_eq!(bytes, b"whatever bytes"),
            _ => panic!("expected Envelope"),
        }
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(decode_inbound(&[]).is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(decode_inbound(&[0xFF]).is_err());
    }

    #[test]
    fn typed_code_reply_parses_expiry_and_code() {
        let mut body = 1_700_000_000u32.to_be_bytes().to_vec();
        body.extend_from_slice(b"12345678");
        let (code, expires_at) = parse_typed_code_reply(&body).unwrap();
        assert_eq!(code, "12345678");
        assert_eq!(expires_at, 1_700_000_000);
    }

    #[test]
    fn refresh_request_is_a_single_byte() {
        assert_eq!(encode_enrollment_refresh_request().len(), 1);
    }
}
