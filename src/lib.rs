//! # companion-protocol
//!
//! Headless client library for a phone-anchored companion messaging
//! protocol: a Noise_XX-secured duplex gateway session, enrollment by
//! scanned code or typed code, a request/response multiplexer, and a
//! media attachment cipher pipeline.
//!
//! This crate is payload-agnostic: chat message shapes, group/contact
//! business logic, QR rendering and the HTTPS blob client are all left to
//! the caller. What lives here is the hard, security-relevant core:
//! handshake, framing, session lifecycle, correlation, and the cipher
//! math for attachments.
//!
//! ## Feature flags
//!
//! - `transport` (default): frame codec, websocket socket, encrypted
//!   connection.
//! - `crypto` (default): Noise_XX handshake, cipher states, key types,
//!   certificate pinning.
//! - `client` (default): session state machine, multiplexer, enrollment,
//!   events, and [`CompanionClient`].
//! - `media` (default): the media cipher pipeline and [`MediaTransport`]
//!   trait.
//! - `full`: all of the above.
//!
//! ## Modules
//!
//! - [`core`]: configuration, the injectable clock, and the error
//!   taxonomy (always included).
//! - [`crypto`]: identity keys, the Noise handshake, cipher states,
//!   certificate pinning, the media cipher primitives.
//! - [`transport`]: frame codec, websocket socket, encrypted connection.
//! - [`multiplexer`]: request/response tag correlation.
//! - [`session`]: connection lifecycle state machine and the actor that
//!   drives it.
//! - [`enroll`]: enrollment bookkeeping shared by both enrollment flows.
//! - [`events`]: the typed event bus.
//! - [`media`]: media upload/download orchestration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included): config, clock, error taxonomy.
pub mod core;

// Crypto layer (feature-gated): keys, Noise handshake, cipher states.
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

// Transport layer (feature-gated): frame codec, websocket, connection.
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client layer (feature-gated): multiplexer, session, enrollment, events.
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod multiplexer;

#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod session;

#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod enroll;

#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod events;

#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
mod client;

// Media cipher pipeline (feature-gated).
#[cfg(feature = "media")]
#[cfg_attr(docsrs, doc(cfg(feature = "media")))]
pub mod media;

#[cfg(feature = "client")]
pub use client::CompanionClient;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    #[cfg(feature = "crypto")]
    pub use crate::crypto::{CipherState, InitiatorHandshake, SessionKeys, StaticKeypair};

    #[cfg(feature = "transport")]
    pub use crate::transport::{Connection, KeepaliveTimer};

    #[cfg(feature = "client")]
    pub use crate::events::{Event, EventPublisher, EventSubscriber};

    #[cfg(feature = "client")]
    pub use crate::session::{ConnectionState, SessionCredential, SessionHandle, TransitionReason};

    #[cfg(feature = "client")]
    pub use crate::CompanionClient;

    #[cfg(feature = "media")]
    pub use crate::media::{MediaKind, MediaTransport};
}
