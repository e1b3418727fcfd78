//! Async WebSocket socket wrapper.
//!
//! Provides a high-level interface for sending and receiving raw binary
//! messages over a websocket connection to the gateway.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::core::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One event read off the raw websocket: either a chunk belonging to the
/// application frame stream, or a pong proving the peer answered a ping.
#[derive(Debug)]
pub enum SocketEvent {
    /// Raw bytes to feed to the frame decoder.
    Data(Vec<u8>),
    /// The peer answered a keepalive ping.
    Pong,
}

/// Async websocket wrapper for the gateway connection.
///
/// Speaks binary messages only; every `send`/`recv` call transfers one
/// opaque buffer (one frame codec chunk, not one logical frame — callers
/// layer [`super::frame`] on top).
pub struct CompanionSocket {
    inner: WsStream,
}

impl CompanionSocket {
    /// Connect to `url`, setting the required `Origin` and `User-Agent`
    /// headers.
    pub async fn connect(url: &str, origin: &str, user_agent: &str) -> Result<Self, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            "Origin",
            origin.parse().map_err(|_| TransportError::Io("invalid origin header".into()))?,
        );
        headers.insert(
            "User-Agent",
            user_agent
                .parse()
                .map_err(|_| TransportError::Io("invalid user-agent header".into()))?,
        );

        let (inner, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Wrap an already-established websocket stream (used in tests).
    pub fn from_stream(inner: WsStream) -> Self {
        Self { inner }
    }

    /// Send one binary message.
    pub async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.inner
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    /// Send a ping frame.
    pub async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.inner
            .send(Message::Ping(payload.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    /// Receive the next event: a binary chunk, or a pong. Pings are
    /// answered transparently; other control frames are ignored.
    ///
    /// Returns `Err(TransportError::Closed)` when the peer closes the
    /// socket or the stream ends.
    pub async fn recv(&mut self) -> Result<SocketEvent, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(SocketEvent::Data(data.to_vec())),
                Some(Ok(Message::Ping(payload))) => {
                    self.inner
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| TransportError::Io(e.to_string()))?;
                }
                Some(Ok(Message::Pong(_))) => return Ok(SocketEvent::Pong),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Text(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    /// Close the socket gracefully.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close(None)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
