//! The typed event bus surfaced to callers.

use tokio::sync::broadcast;

use crate::session::{ConnectionState, SessionCredential, TransitionReason};

/// One bounded queue of events per subscriber. Slow consumers receive
/// `Lagged` notifications from `tokio::sync::broadcast` rather than
/// blocking the publisher; oldest events are dropped first.
#[derive(Debug, Clone)]
pub enum Event {
    /// A connection-state transition occurred.
    StateChanged {
        /// Prior state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
        /// Why the transition happened.
        reason: TransitionReason,
    },
    /// The server pushed a scanned-image enrollment code.
    EnrollmentCodeImage {
        /// Opaque code payload to render as a QR image.
        payload: Vec<u8>,
        /// Attempt number (1-indexed).
        attempt: u32,
        /// Configured maximum attempts.
        max_attempts: u32,
        /// Wall-clock seconds since the Unix epoch when this code expires.
        expires_at_unix: u64,
    },
    /// The server issued a typed-code enrollment code.
    EnrollmentCodeTyped {
        /// Short numeric code for the caller to display.
        code: String,
        /// Wall-clock seconds since the Unix epoch when this code expires.
        expires_at_unix: u64,
    },
    /// Enrollment succeeded and the session is now usable.
    Authenticated {
        /// A copy of the freshly established credential.
        credential: SessionCredential,
    },
    /// The session logged out; the credential is no longer valid.
    LoggedOut {
        /// Human-readable reason.
        reason: String,
    },
    /// An unsolicited envelope arrived from the gateway.
    IncomingEnvelope(Vec<u8>),
    /// A delivery or read receipt arrived.
    Receipt(Vec<u8>),
    /// A connection-level error occurred; the state machine will attempt
    /// recovery per the current state's transition table.
    ConnectionError {
        /// Human-readable description.
        message: String,
    },
}

/// Publishing side of the event bus, owned by the session actor.
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<Event>,
}

/// Subscription handle returned to callers.
pub type EventSubscriber = broadcast::Receiver<Event>;

impl EventPublisher {
    /// Create a publisher with the given per-subscriber queue capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe a new receiver. Each subscriber gets its own bounded
    /// queue; events published before this call are not replayed.
    pub fn subscribe(&self) -> EventSubscriber {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers. A `SendError` (no
    /// subscribers) is not a failure worth propagating.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let publisher = EventPublisher::new(8);
        let mut subscriber = publisher.subscribe();
        publisher.publish(Event::LoggedOut {
            reason: "test".into(),
        });
        let event = subscriber.recv().await.unwrap();
        assert!(matches!(event, Event::LoggedOut { .. }));
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lagged() {
        let publisher = EventPublisher::new(2);
        let mut subscriber = publisher.subscribe();
        for _ in 0..5 {
            publisher.publish(Event::ConnectionError {
                message: "x".into(),
            });
        }
        let result = subscriber.recv().await;
        assert!(matches!(result, Err(broadcast::error::RecvError::Lagged(_))));
    }
}
