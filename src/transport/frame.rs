//! Length-prefixed frame codec.
//!
//! Every frame on the wire is `[24-bit big-endian length][body]`. The very
//! first frame a socket ever writes is additionally preceded by a 4-byte
//! magic header; this happens exactly once per socket, never again after a
//! reconnect establishes a new one.

use crate::core::{TransportError, MAGIC_HEADER, MAX_FRAME_PAYLOAD};

/// Encode a single frame's wire bytes: `[3-byte BE length][body]`.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    if body.len() > MAX_FRAME_PAYLOAD {
        return Err(TransportError::MalformedLength);
    }
    let len = body.len() as u32;
    let mut out = Vec::with_capacity(3 + body.len());
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(body);
    Ok(out)
}

/// Prepend the one-time magic header to a frame's wire bytes. Call only for
/// the first frame written on a fresh socket.
pub fn with_magic_header(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC_HEADER.len() + frame.len());
    out.extend_from_slice(&MAGIC_HEADER);
    out.extend_from_slice(frame);
    out
}

/// Incremental decoder that buffers partial reads until a full frame is
/// available.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Construct an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly received bytes into the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Try to pull one complete frame body out of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed (never an error).
    pub fn try_decode(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.buffer.len() < 3 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([0, self.buffer[0], self.buffer[1], self.buffer[2]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(TransportError::MalformedLength);
        }
        if self.buffer.len() < 3 + len {
            return Ok(None);
        }
        let body = self.buffer[3..3 + len].to_vec();
        self.buffer.drain(..3 + len);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_empty_payload() {
        let frame = encode_frame(&[]).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert_eq!(decoder.try_decode().unwrap(), Some(vec![]));
    }

    #[test]
    fn roundtrips_one_byte_payload() {
        let frame = encode_frame(&[0x42]).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert_eq!(decoder.try_decode().unwrap(), Some(vec![0x42]));
    }

    #[test]
    fn roundtrips_max_minus_one_payload() {
        let payload = vec![0xABu8; MAX_FRAME_PAYLOAD - 1];
        let frame = encode_frame(&payload).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert_eq!(decoder.try_decode().unwrap(), Some(payload));
    }

    #[test]
    fn roundtrips_max_payload() {
        let payload = vec![0xCDu8; MAX_FRAME_PAYLOAD];
        let frame = encode_frame(&payload).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert_eq!(decoder.try_decode().unwrap(), Some(payload));
    }

    #[test]
    fn rejects_oversize_payload_on_encode() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert!(matches!(encode_frame(&payload), Err(TransportError::MalformedLength)));
    }

    #[test]
    fn rejects_oversize_length_prefix_on_decode() {
        let mut decoder = FrameDecoder::new();
        // Length prefix one past the maximum, body omitted: must error before
        // waiting for bytes that will never arrive as a valid frame.
        let bad_len = (MAX_FRAME_PAYLOAD as u32 + 1).to_be_bytes();
        decoder.feed(&bad_len[1..]);
        assert!(matches!(decoder.try_decode(), Err(TransportError::MalformedLength)));
    }

    #[test]
    fn buffers_partial_reads_across_feeds() {
        let frame = encode_frame(b"hello world").unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame[..4]);
        assert_eq!(decoder.try_decode().unwrap(), None);
        decoder.feed(&frame[4..]);
        assert_eq!(decoder.try_decode().unwrap(), Some(b"hello world".to_vec()));
    }

    #[test]
    fn decodes_multiple_frames_from_one_buffer() {
        let mut bytes = encode_frame(b"one").unwrap();
        bytes.extend(encode_frame(b"two").unwrap());
        let mut decoder = FrameDecoder::new();
        decoder.feed(&bytes);
        assert_eq!(decoder.try_decode().unwrap(), Some(b"one".to_vec()));
        assert_eq!(decoder.try_decode().unwrap(), Some(b"two".to_vec()));
        assert_eq!(decoder.try_decode().unwrap(), None);
    }

    #[test]
    fn magic_header_prefixes_exactly_once() {
        let frame = encode_frame(b"hi").unwrap();
        let first = with_magic_header(&frame);
        assert_eq!(&first[..4], &MAGIC_HEADER);
        assert_eq!(&first[4..], &frame[..]);
    }
}
