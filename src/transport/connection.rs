//! Ties the frame codec, websocket socket and Noise cipher states together
//! into one encrypted, ordered message stream.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{Clock, TransportError};
use crate::crypto::{CipherState, InitiatorHandshake, SessionKeys, StaticKeypair};

use super::frame::{encode_frame, with_magic_header, FrameDecoder};
use super::socket::{CompanionSocket, SocketEvent};

/// One event read off an encrypted [`Connection`]: either a decrypted
/// application payload, or a pong proving the peer is alive.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A fully decoded and decrypted logical payload.
    Payload(Vec<u8>),
    /// The peer answered a keepalive ping; no payload to process.
    Pong,
}

/// An encrypted, framed connection to the gateway.
///
/// Owns the websocket, the post-handshake cipher states, and the frame
/// decoder's partial-read buffer. Every write and read goes through here;
/// nothing above this layer touches raw bytes.
pub struct Connection {
    socket: CompanionSocket,
    decoder: FrameDecoder,
    write_cipher: CipherState,
    read_cipher: CipherState,
    wrote_magic_header: bool,
}

impl Connection {
    /// Run the Noise_XX handshake over a freshly connected socket and
    /// return an encrypted connection, the decrypted server payload from
    /// message two (the certificate chain, for the caller to verify), and
    /// the raw traffic keys for the caller to persist in a credential.
    pub async fn handshake(
        mut socket: CompanionSocket,
        identity: StaticKeypair,
        service_tag: [u8; 4],
        client_hello_payload: &[u8],
    ) -> Result<(Self, Vec<u8>, SessionKeys), TransportError> {
        let mut handshake = InitiatorHandshake::new(identity, service_tag);

        let e_pub = handshake.write_message_1();
        let mut msg1_body = vec![0x00];
        msg1_body.extend_from_slice(&e_pub);
        let msg1 = encode_frame(&msg1_body).map_err(|_| TransportError::MalformedLength)?;
        socket.send(with_magic_header(&msg1)).await?;

        let msg2_body = Self::read_one_frame(&mut socket).await?;
        let server_payload = handshake
            .read_message_2(&msg2_body)
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let (msg3_body, SessionKeys { write_key, read_key }) = handshake
            .write_message_3(client_hello_payload)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let msg3 = encode_frame(&msg3_body).map_err(|_| TransportError::MalformedLength)?;
        socket.send(msg3).await?;

        let connection = Self {
            socket,
            decoder: FrameDecoder::new(),
            write_cipher: CipherState::new(write_key),
            read_cipher: CipherState::new(read_key),
            wrote_magic_header: true,
        };
        Ok((connection, server_payload, SessionKeys { write_key, read_key }))
    }

    async fn read_one_frame(socket: &mut CompanionSocket) -> Result<Vec<u8>, TransportError> {
        let mut decoder = FrameDecoder::new();
        loop {
            if let Some(frame) = decoder.try_decode()? {
                return Ok(frame);
            }
            match socket.recv().await? {
                SocketEvent::Data(bytes) => decoder.feed(&bytes),
                SocketEvent::Pong => continue,
            }
        }
    }

    /// Encrypt and send one logical plaintext payload.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<(), TransportError> {
        let ciphertext = self
            .write_cipher
            .encrypt(b"", plaintext)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let frame = encode_frame(&ciphertext).map_err(|_| TransportError::MalformedLength)?;
        let wire = if self.wrote_magic_header {
            frame
        } else {
            self.wrote_magic_header = true;
            with_magic_header(&frame)
        };
        self.socket.send(wire).await
    }

    /// Receive the next event: a decrypted logical payload, or a pong.
    ///
    /// Loops internally until a full frame is decoded or a pong arrives,
    /// buffering partial websocket messages across calls.
    pub async fn recv(&mut self) -> Result<ConnectionEvent, TransportError> {
        loop {
            if let Some(frame) = self.decoder.try_decode()? {
                let payload = self
                    .read_cipher
                    .decrypt(b"", &frame)
                    .map_err(|e| TransportError::Io(e.to_string()))?;
                return Ok(ConnectionEvent::Payload(payload));
            }
            match self.socket.recv().await? {
                SocketEvent::Data(bytes) => self.decoder.feed(&bytes),
                SocketEvent::Pong => return Ok(ConnectionEvent::Pong),
            }
        }
    }

    /// Send a keepalive ping.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.socket.send_ping(Vec::new()).await
    }

    /// Close the underlying socket.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.socket.close().await
    }
}

/// Drives the keepalive schedule: emits `true` when it is time to send a
/// ping, and reports whether the silence grace period has elapsed.
pub struct KeepaliveTimer {
    clock: Arc<dyn Clock>,
    interval: Duration,
    grace: Duration,
    last_activity: std::time::Instant,
    last_ping: std::time::Instant,
}

impl KeepaliveTimer {
    /// Start a new timer, considering "now" as the last activity instant.
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, grace: Duration) -> Self {
        let now = clock.now();
        Self {
            clock,
            interval,
            grace,
            last_activity: now,
            last_ping: now,
        }
    }

    /// Record that a frame (of any kind) was received.
    pub fn note_activity(&mut self) {
        self.last_activity = self.clock.now();
    }

    /// Whether a ping is due.
    pub fn should_ping(&self) -> bool {
        self.clock.now().duration_since(self.last_ping) >= self.interval
    }

    /// Record that a ping was just sent.
    pub fn note_ping_sent(&mut self) {
        self.last_ping = self.clock.now();
    }

    /// Whether the silence grace period has elapsed without any activity.
    pub fn is_silent_too_long(&self) -> bool {
        self.clock.now().duration_since(self.last_activity) >= self.grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SimClock;

    #[test]
    fn ping_is_due_after_interval_elapses() {
        let clock = Arc::new(SimClock::new());
        let mut timer = KeepaliveTimer::new(clock.clone(), Duration::from_secs(20), Duration::from_secs(60));
        assert!(!timer.should_ping());
        clock.advance(Duration::from_secs(21));
        assert!(timer.should_ping());
        timer.note_ping_sent();
        assert!(!timer.should_ping());
    }

    #[test]
    fn silence_grace_triggers_after_no_activity() {
        let clock = Arc::new(SimClock::new());
        let mut timer = KeepaliveTimer::new(clock.clone(), Duration::from_secs(20), Duration::from_secs(60));
        assert!(!timer.is_silent_too_long());
        clock.advance(Duration::from_secs(61));
        assert!(timer.is_silent_too_long());
        timer.note_activity();
        assert!(!timer.is_silent_too_long());
    }
}
