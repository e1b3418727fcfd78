//! Frame codec, websocket socket wrapper, and the encrypted connection that
//! combines both with the Noise cipher states.

mod connection;
mod frame;
mod socket;

pub use connection::{Connection, ConnectionEvent, KeepaliveTimer};
pub use frame::{encode_frame, with_magic_header, FrameDecoder};
pub use socket::{CompanionSocket, SocketEvent};
