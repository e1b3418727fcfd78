//! The dedicated session actor.
//!
//! A single task owns the socket, both cipher states (via [`Connection`]),
//! the pending-request map, and the connection-state enum. Every other
//! handle in the crate is a cheap clone of an `mpsc::Sender<Command>`;
//! nothing outside this file ever touches the socket or a cipher state
//! directly.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::core::{
    Clock, ClientConfig, CryptoError, MultiplexError, SessionError, SystemClock, SERVICE_TAG,
};
use crate::crypto::{parse_certificate_chain, PinnedIssuers, StaticKeypair};
use crate::enroll::{validate_typed_code_destination, ScannedEnrollmentTracker};
use crate::events::{Event, EventPublisher};
use crate::multiplexer::Multiplexer;
use crate::transport::{CompanionSocket, Connection, ConnectionEvent, KeepaliveTimer};

use super::backoff::Backoff;
use super::credential::SessionCredential;
use super::envelope::{decode_inbound, encode_enrollment_refresh_request, encode_request, parse_typed_code_reply, InboundMessage};
use super::state::{ConnectionState, TransitionReason};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Commands accepted by the session actor over its bounded channel.
pub enum Command {
    /// Begin connecting, or reconnecting immediately if currently idle.
    Connect,
    /// Clear the credential and return to `Disconnected`.
    Logout,
    /// Send a tagged request and await its reply.
    Request {
        payload: Vec<u8>,
        deadline: Duration,
        result: oneshot::Sender<Result<Vec<u8>, MultiplexError>>,
    },
    /// Request a fresh scanned-image code outside the normal expiry cycle.
    RequestScannedCode,
    /// Start the typed-code flow for a destination phone identifier.
    RequestTypedCode {
        destination: String,
        result: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Snapshot the current credential, if any.
    SnapshotCredential {
        result: oneshot::Sender<Option<SessionCredential>>,
    },
    /// Replace the current credential, used to restore a prior session.
    RestoreCredential { credential: Box<SessionCredential> },
    /// Stop the actor, closing the socket if one is open.
    Shutdown,
}

/// Cheaply cloneable handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Ask the actor to connect (or reconnect) now.
    pub async fn connect(&self) {
        let _ = self.commands.send(Command::Connect).await;
    }

    /// Ask the actor to log out and clear its credential.
    pub async fn logout(&self) {
        let _ = self.commands.send(Command::Logout).await;
    }

    /// Send a tagged request, awaiting its reply or timeout/disconnection.
    /// Dropping the returned future before it resolves cancels the
    /// request: the actor reclaims its slot the next time it touches the
    /// pending-request map.
    pub async fn request(&self, payload: Vec<u8>, deadline: Duration) -> Result<Vec<u8>, MultiplexError> {
        let (result, receiver) = oneshot::channel();
        if self
            .commands
            .send(Command::Request { payload, deadline, result })
            .await
            .is_err()
        {
            return Err(MultiplexError::Disconnected);
        }
        receiver.await.unwrap_or(Err(MultiplexError::Disconnected))
    }

    /// Ask the gateway to push a fresh scanned-image enrollment code.
    pub async fn request_scanned_code(&self) {
        let _ = self.commands.send(Command::RequestScannedCode).await;
    }

    /// Start the typed-code enrollment flow for `destination`.
    pub async fn request_typed_code(&self, destination: String) -> Result<(), SessionError> {
        let (result, receiver) = oneshot::channel();
        if self
            .commands
            .send(Command::RequestTypedCode { destination, result })
            .await
            .is_err()
        {
            return Err(SessionError::Disconnected);
        }
        receiver.await.unwrap_or(Err(SessionError::Disconnected))
    }

    /// Snapshot the current credential, if any.
    pub async fn snapshot_credential(&self) -> Option<SessionCredential> {
        let (result, receiver) = oneshot::channel();
        if self.commands.send(Command::SnapshotCredential { result }).await.is_err() {
            return None;
        }
        receiver.await.ok().flatten()
    }

    /// Restore a previously snapshotted credential before connecting.
    pub async fn restore_credential(&self, credential: SessionCredential) {
        let _ = self
            .commands
            .send(Command::RestoreCredential { credential: Box::new(credential) })
            .await;
    }

    /// Stop the actor.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// The actor's state, plus everything it needs to drive the connection
/// lifecycle without any outside synchronization.
pub struct SessionActor {
    config: ClientConfig,
    state: ConnectionState,
    identity: StaticKeypair,
    credential: Option<SessionCredential>,
    connection: Option<Connection>,
    keepalive: Option<KeepaliveTimer>,
    backoff: Backoff,
    mux: Multiplexer,
    events: EventPublisher,
    commands: mpsc::Receiver<Command>,
    deadlines: BinaryHeap<Reverse<(Instant, String)>>,
    scanned: Option<ScannedEnrollmentTracker>,
    clock: Arc<dyn Clock>,
    /// Set when a [`Command::Shutdown`] is what drove the transition into
    /// `Closing`, so the outer loop knows to stop the actor afterward
    /// instead of settling back into `Disconnected` and continuing to
    /// serve commands (which is what a plain logout does).
    shutting_down: bool,
    /// Traffic keys captured from the most recently completed handshake,
    /// stored here until they are written into the session credential
    /// (immediately, for a restored session; at enrollment success, for a
    /// fresh one).
    current_keys: Option<([u8; 32], [u8; 32])>,
}

impl SessionActor {
    /// Spawn the actor on the current Tokio runtime, returning a handle.
    pub fn spawn(config: ClientConfig, credential: Option<SessionCredential>, events: EventPublisher) -> SessionHandle {
        Self::spawn_with_clock(config, credential, events, Arc::new(SystemClock))
    }

    /// Spawn with an injected clock, used by tests that simulate elapsed
    /// time for the enrollment-code refresh cycle.
    pub(crate) fn spawn_with_clock(
        config: ClientConfig,
        credential: Option<SessionCredential>,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let identity = credential.as_ref().map(SessionCredential::identity_keypair).unwrap_or_else(StaticKeypair::generate);
        let backoff = Backoff::new(
            config.reconnect_initial_delay,
            config.reconnect_factor,
            config.reconnect_max_delay,
            crate::core::DEFAULT_BACKOFF_JITTER,
            config.reconnect_max_attempts,
        );
        let actor = Self {
            config,
            state: ConnectionState::Disconnected,
            identity,
            credential,
            connection: None,
            keepalive: None,
            backoff,
            mux: Multiplexer::new(),
            events,
            commands: rx,
            deadlines: BinaryHeap::new(),
            scanned: None,
            clock,
            shutting_down: false,
            current_keys: None,
        };
        tokio::spawn(actor.run());
        SessionHandle { commands: tx }
    }

    async fn run(mut self) {
        loop {
            let keep_going = match self.state {
                ConnectionState::Disconnected => self.run_disconnected().await,
                ConnectionState::Connecting | ConnectionState::Handshake => {
                    self.attempt_connect().await;
                    true
                }
                ConnectionState::AwaitingEnrollment => self.run_connected(true).await,
                ConnectionState::Authenticated => self.run_connected(false).await,
                ConnectionState::Reconnecting => self.run_reconnecting().await,
                ConnectionState::Closing => {
                    self.run_closing().await;
                    !self.shutting_down
                }
            };
            if !keep_going {
                break;
            }
        }
        info!("session actor stopped");
    }

    fn transition(&mut self, to: ConnectionState, reason: TransitionReason) {
        let from = self.state;
        self.state = to;
        debug!(?from, ?to, ?reason, "session state transition");
        self.events.publish(Event::StateChanged { from, to, reason });
    }

    async fn run_disconnected(&mut self) -> bool {
        while let Some(cmd) = self.commands.recv().await {
            match cmd {
                Command::Connect => {
                    self.transition(ConnectionState::Connecting, TransitionReason::ConnectRequested);
                    return true;
                }
                Command::Shutdown => return false,
                other => {
                    self.handle_idle_command(other).await;
                    // `Logout` moves to `Closing` even with nothing connected,
                    // to run through the same credential-clearing path; hand
                    // control back to `run()` so that transition is acted on.
                    if self.state != ConnectionState::Disconnected {
                        return true;
                    }
                }
            }
        }
        false
    }

    async fn handle_idle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Request { result, .. } => {
                let _ = result.send(Err(MultiplexError::Disconnected));
            }
            Command::RequestTypedCode { result, .. } => {
                let _ = result.send(Err(SessionError::Disconnected));
            }
            Command::RequestScannedCode => {}
            Command::SnapshotCredential { result } => {
                let _ = result.send(self.credential.clone());
            }
            Command::RestoreCredential { credential } => {
                self.identity = credential.identity_keypair();
                self.credential = Some(*credential);
            }
            Command::Logout => self.do_logout("caller requested logout while disconnected".into()),
            Command::Connect | Command::Shutdown => unreachable!("handled by caller"),
        }
    }

    fn build_client_hello(&self) -> Vec<u8> {
        let (major, minor, patch) = self.config.protocol_version;
        let mut out = vec![major];
        out.extend_from_slice(&minor.to_be_bytes());
        out.push(patch);
        write_str(&mut out, &self.config.browser_identity.platform);
        write_str(&mut out, &self.config.browser_identity.name);
        write_str(&mut out, &self.config.browser_identity.version);
        out
    }

    fn verify_server_payload(&self, payload: &[u8]) -> Result<(), CryptoError> {
        if self.config.pinned_issuer_serials.is_empty() {
            return Ok(());
        }
        let chain = parse_certificate_chain(payload)?;
        let pins = PinnedIssuers::new(self.config.pinned_issuer_serials.clone());
        pins.verify(&chain)?;
        Ok(())
    }

    async fn attempt_connect(&mut self) {
        let socket = match tokio::time::timeout(
            self.config.connect_timeout,
            CompanionSocket::connect(&self.config.endpoint_url, &self.config.origin, &self.config.user_agent),
        )
        .await
        {
            Ok(Ok(socket)) => socket,
            Ok(Err(e)) => return self.fail_connect_attempt(e.to_string()),
            Err(_) => return self.fail_connect_attempt("connect timed out".into()),
        };

        self.transition(ConnectionState::Handshake, TransitionReason::SocketOpen);

        let identity = self.identity.clone();
        let client_hello = self.build_client_hello();
        let handshake = tokio::time::timeout(
            self.config.handshake_timeout,
            Connection::handshake(socket, identity, SERVICE_TAG, &client_hello),
        )
        .await;

        let (connection, server_payload, session_keys) = match handshake {
            Ok(Ok(triple)) => triple,
            Ok(Err(e)) => return self.fail_connect_attempt(e.to_string()),
            Err(_) => return self.fail_connect_attempt("handshake timed out".into()),
        };

        if let Err(e) = self.verify_server_payload(&server_payload) {
            self.credential = None;
            self.events.publish(Event::LoggedOut { reason: e.to_string() });
            return self.fail_connect_attempt(e.to_string());
        }

        self.connection = Some(connection);
        self.current_keys = Some((session_keys.write_key, session_keys.read_key));
        self.keepalive = Some(KeepaliveTimer::new(
            self.clock.clone(),
            self.config.keepalive_interval,
            self.config.keepalive_grace,
        ));
        self.backoff.reset();

        if let Some(credential) = self.credential.as_mut() {
            credential.write_key = session_keys.write_key;
            credential.read_key = session_keys.read_key;
            credential.touch();
            self.transition(ConnectionState::Authenticated, TransitionReason::HandshakeCompleteRestored);
        } else {
            self.scanned = Some(ScannedEnrollmentTracker::start(
                self.clock.now(),
                self.config.enrollment_code_timeout,
                self.config.enrollment_max_attempts,
            ));
            self.transition(ConnectionState::AwaitingEnrollment, TransitionReason::HandshakeCompleteFresh);
        }
    }

    fn fail_connect_attempt(&mut self, message: String) {
        warn!(error = %message, "connection attempt failed");
        self.events.publish(Event::ConnectionError { message: message.clone() });
        self.connection = None;
        self.keepalive = None;
        self.mux.drain_disconnected();
        if !self.config.auto_reconnect {
            self.transition(ConnectionState::Disconnected, TransitionReason::Error(message));
        } else {
            self.transition(ConnectionState::Reconnecting, TransitionReason::Error(message));
        }
    }

    async fn run_reconnecting(&mut self) -> bool {
        let delay = match self.backoff.next_delay() {
            Some(delay) => delay,
            None => {
                self.transition(ConnectionState::Disconnected, TransitionReason::MaxAttemptsReached);
                return true;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                self.transition(ConnectionState::Connecting, TransitionReason::BackoffElapsed);
                true
            }
            cmd = self.commands.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => false,
                    Some(Command::Logout) => { self.do_logout("caller requested logout while reconnecting".into()); true }
                    Some(other) => { self.handle_idle_command(other).await; true }
                }
            }
        }
    }

    async fn run_closing(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = connection.close().await;
        }
        self.mux.drain_disconnected();
        self.keepalive = None;
        self.transition(ConnectionState::Disconnected, TransitionReason::LogoutRequested);
    }

    fn do_logout(&mut self, reason: String) {
        self.credential = None;
        self.mux.drain_disconnected();
        self.events.publish(Event::LoggedOut { reason });
        self.transition(ConnectionState::Closing, TransitionReason::LogoutRequested);
    }

    /// Drives both `AwaitingEnrollment` and `Authenticated`: the two states
    /// in which a live connection exists and inbound frames must be
    /// demultiplexed. `is_enrolling` governs whether the scanned-code
    /// refresh timer is armed.
    async fn run_connected(&mut self, is_enrolling: bool) -> bool {
        loop {
            self.mux.purge_cancelled();
            let next_deadline = self.next_request_deadline();
            let enrollment_sleep = if is_enrolling {
                self.scanned
                    .as_ref()
                    .map(|s| s.expires_at().saturating_duration_since(self.clock.now()))
                    .unwrap_or(Duration::from_secs(3600))
            } else {
                Duration::from_secs(3600)
            };
            let keepalive_sleep = self
                .keepalive
                .as_ref()
                .map(|_| Duration::from_millis(500))
                .unwrap_or(Duration::from_secs(3600));
            let request_sleep = next_deadline
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            let keepalive_armed = self.keepalive.is_some();
            let request_armed = next_deadline.is_some();

            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_connected_command(cmd).await,
                        None => return false,
                    }
                }
                inbound = recv_inbound(&mut self.connection) => {
                    match inbound {
                        Ok(ConnectionEvent::Payload(payload)) => {
                            if let Some(timer) = self.keepalive.as_mut() {
                                timer.note_activity();
                            }
                            self.handle_inbound(payload).await;
                        }
                        Ok(ConnectionEvent::Pong) => {
                            if let Some(timer) = self.keepalive.as_mut() {
                                timer.note_activity();
                            }
                        }
                        Err(message) => {
                            self.credential_invalidated_by_transport_error(&message);
                            self.fail_connect_attempt(message);
                            return true;
                        }
                    }
                }
                _ = tokio::time::sleep(enrollment_sleep), if is_enrolling => {
                    self.on_enrollment_code_expired().await;
                }
                _ = tokio::time::sleep(keepalive_sleep), if keepalive_armed => {
                    self.drive_keepalive().await;
                }
                _ = tokio::time::sleep(request_sleep), if request_armed => {
                    self.expire_due_requests();
                }
            }

            if self.state != ConnectionState::AwaitingEnrollment && self.state != ConnectionState::Authenticated {
                return true;
            }
        }
    }

    /// Peek the earliest still-pending request deadline. Entries for
    /// already-completed requests are left in the heap and simply produce a
    /// harmless no-op [`Multiplexer::expire`] call once popped.
    fn next_request_deadline(&self) -> Option<Instant> {
        self.deadlines.peek().map(|Reverse((at, _))| *at)
    }

    fn expire_due_requests(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((at, _))) = self.deadlines.peek() {
            if *at > now {
                break;
            }
            let Reverse((_, tag)) = self.deadlines.pop().unwrap();
            self.mux.expire(&tag);
        }
    }

    async fn drive_keepalive(&mut self) {
        let Some(connection) = self.connection.as_mut() else { return };
        let timer = self.keepalive.as_mut().expect("keepalive armed");
        if timer.is_silent_too_long() {
            warn!("keepalive grace period elapsed, reconnecting");
            self.fail_connect_attempt("keepalive silence exceeded grace period".into());
            return;
        }
        if timer.should_ping() {
            if connection.ping().await.is_err() {
                self.fail_connect_attempt("failed to send keepalive ping".into());
                return;
            }
            timer.note_ping_sent();
        }
    }

    fn credential_invalidated_by_transport_error(&mut self, _message: &str) {
        // AEAD/framing failures on the read path are non-recoverable per
        // the read-path contract: the credential must not be reused.
        if self.credential.take().is_some() {
            self.events.publish(Event::LoggedOut { reason: "transport error invalidated the session".into() });
        }
    }

    /// Handle one command while a connection is live. The caller detects a
    /// resulting exit from `AwaitingEnrollment`/`Authenticated` (e.g. from
    /// `Shutdown` or `Logout` moving to `Closing`) via the state check at
    /// the bottom of [`run_connected`](Self::run_connected)'s loop.
    async fn handle_connected_command(&mut self, cmd: Command) {
        match cmd {
            Command::Shutdown => {
                self.shutting_down = true;
                self.transition(ConnectionState::Closing, TransitionReason::LogoutRequested);
            }
            Command::Logout => self.do_logout("caller requested logout".into()),
            Command::Connect => {}
            Command::Request { payload, deadline, result } => {
                if !self.state.is_usable() {
                    let _ = result.send(Err(MultiplexError::Disconnected));
                    return;
                }
                let Some(connection) = self.connection.as_mut() else {
                    let _ = result.send(Err(MultiplexError::Disconnected));
                    return;
                };
                let tag = self.mux.register_with(result);
                let wire = encode_request(&tag, &payload);
                self.deadlines.push(Reverse((Instant::now() + deadline, tag.clone())));
                if connection.send(&wire).await.is_err() {
                    self.mux.expire(&tag);
                }
            }
            Command::RequestScannedCode => self.send_scanned_refresh().await,
            Command::RequestTypedCode { destination, result } => {
                self.start_typed_code_flow(destination, result).await;
            }
            Command::SnapshotCredential { result } => {
                let _ = result.send(self.credential.clone());
            }
            Command::RestoreCredential { credential } => {
                self.identity = credential.identity_keypair();
                self.credential = Some(*credential);
            }
        }
    }

    async fn send_scanned_refresh(&mut self) {
        let Some(connection) = self.connection.as_mut() else { return };
        let _ = connection.send(&encode_enrollment_refresh_request()).await;
    }

    async fn start_typed_code_flow(&mut self, destination: String, result: oneshot::Sender<Result<(), SessionError>>) {
        if let Err(e) = validate_typed_code_destination(&destination) {
            let _ = result.send(Err(SessionError::Config(e.to_string())));
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            let _ = result.send(Err(SessionError::Disconnected));
            return;
        };
        let (tag, receiver) = self.mux.register();
        let wire = encode_request(&tag, destination.as_bytes());
        if connection.send(&wire).await.is_err() {
            self.mux.expire(&tag);
            let _ = result.send(Err(SessionError::Disconnected));
            return;
        }
        let _ = result.send(Ok(()));

        let events = self.events.clone();
        tokio::spawn(async move {
            if let Ok(Ok(body)) = receiver.await {
                if let Ok((code, expires_at_unix)) = parse_typed_code_reply(&body) {
                    events.publish(Event::EnrollmentCodeTyped { code, expires_at_unix });
                }
            }
        });
    }

    async fn on_enrollment_code_expired(&mut self) {
        let Some(tracker) = self.scanned.as_mut() else { return };
        if tracker.is_exhausted() {
            warn!(error = %tracker.exhausted_error(), "scanned enrollment code retries exhausted");
            self.scanned = None;
            self.transition(ConnectionState::Disconnected, TransitionReason::EnrollmentExhausted);
            self.connection = None;
            self.keepalive = None;
            return;
        }
        tracker.advance(self.clock.now(), self.config.enrollment_code_timeout);
        self.send_scanned_refresh().await;
    }

    async fn handle_inbound(&mut self, payload: Vec<u8>) {
        let decoded = match decode_inbound(&payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "dropping unparseable inbound payload");
                return;
            }
        };

        match decoded {
            InboundMessage::Reply { tag, body } => self.mux.complete(&tag, body),
            InboundMessage::Envelope(bytes) => self.events.publish(Event::IncomingEnvelope(bytes)),
            InboundMessage::Receipt(bytes) => self.events.publish(Event::Receipt(bytes)),
            InboundMessage::EnrollmentCodeImage { payload, attempt, max_attempts, expires_at_unix } => {
                self.events.publish(Event::EnrollmentCodeImage { payload, attempt, max_attempts, expires_at_unix });
            }
            InboundMessage::EnrollmentCodeTyped { code, expires_at_unix } => {
                self.events.publish(Event::EnrollmentCodeTyped { code, expires_at_unix });
            }
            InboundMessage::EnrollmentSuccess { registration_id, server_token } => {
                self.complete_enrollment(registration_id, server_token);
            }
        }
    }

    fn complete_enrollment(&mut self, registration_id: String, server_token: String) {
        let Some((write_key, read_key)) = self.current_keys else { return };
        let credential = SessionCredential::new(&self.identity, registration_id, server_token, write_key, read_key);
        self.scanned = None;
        self.credential = Some(credential.clone());
        self.transition(ConnectionState::Authenticated, TransitionReason::EnrollmentSucceeded);
        self.events.publish(Event::Authenticated { credential });
    }
}

async fn recv_inbound(connection: &mut Option<Connection>) -> Result<ConnectionEvent, String> {
    match connection {
        Some(connection) => connection.recv().await.map_err(|e| e.to_string()),
        None => std::future::pending::<Result<ConnectionEvent, String>>().await,
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClientConfigBuilder, SimClock};

    /// Build an actor directly, bypassing `spawn`/`spawn_with_clock` so
    /// tests can drive its private methods without a live socket or a
    /// running `run()` task.
    fn test_actor(clock: Arc<dyn Clock>, config: ClientConfig) -> (SessionActor, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(8);
        let backoff = Backoff::new(
            config.reconnect_initial_delay,
            config.reconnect_factor,
            config.reconnect_max_delay,
            crate::core::DEFAULT_BACKOFF_JITTER,
            config.reconnect_max_attempts,
        );
        let actor = SessionActor {
            config,
            state: ConnectionState::AwaitingEnrollment,
            identity: StaticKeypair::generate(),
            credential: None,
            connection: None,
            keepalive: None,
            backoff,
            mux: Multiplexer::new(),
            events: EventPublisher::new(16),
            commands: rx,
            deadlines: BinaryHeap::new(),
            scanned: None,
            clock,
            shutting_down: false,
            current_keys: None,
        };
        (actor, tx)
    }

    #[tokio::test]
    async fn enrollment_refresh_cycle_exhausts_after_max_attempts() {
        let clock = Arc::new(SimClock::new());
        let config = ClientConfigBuilder::new()
            .enrollment(Duration::from_secs(30), 3)
            .build()
            .unwrap();
        let (mut actor, _tx) = test_actor(clock.clone(), config);
        let mut events = actor.events.subscribe();
        actor.scanned = Some(ScannedEnrollmentTracker::start(clock.now(), Duration::from_secs(30), 3));

        actor.on_enrollment_code_expired().await;
        assert_eq!(actor.scanned.as_ref().unwrap().attempt(), 2);
        assert_eq!(actor.state, ConnectionState::AwaitingEnrollment);

        clock.advance(Duration::from_secs(30));
        actor.on_enrollment_code_expired().await;
        assert_eq!(actor.scanned.as_ref().unwrap().attempt(), 3);
        assert_eq!(actor.state, ConnectionState::AwaitingEnrollment);

        clock.advance(Duration::from_secs(30));
        actor.on_enrollment_code_expired().await;
        assert!(actor.scanned.is_none());
        assert_eq!(actor.state, ConnectionState::Disconnected);

        let mut saw_exhausted = false;
        while let Ok(event) = events.try_recv() {
            if let Event::StateChanged {
                to: ConnectionState::Disconnected,
                reason: TransitionReason::EnrollmentExhausted,
                ..
            } = event
            {
                saw_exhausted = true;
            }
        }
        assert!(saw_exhausted, "expected an EnrollmentExhausted transition event");
    }

    #[test]
    fn build_client_hello_encodes_version_and_identity() {
        let clock = Arc::new(SimClock::new());
        let config = ClientConfig::default();
        let (actor, _tx) = test_actor(clock, config.clone());
        let hello = actor.build_client_hello();

        let (major, minor, patch) = config.protocol_version;
        assert_eq!(hello[0], major);
        assert_eq!(hello[1..3].to_vec(), minor.to_be_bytes().to_vec());
        assert_eq!(hello[3], patch);
    }

    #[test]
    fn verify_server_payload_skips_check_when_unpinned() {
        let clock = Arc::new(SimClock::new());
        let config = ClientConfig::default();
        let (actor, _tx) = test_actor(clock, config);
        assert!(actor.verify_server_payload(b"not a certificate chain").is_ok());
    }
}
