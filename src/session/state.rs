//! The connection lifecycle state machine.

/// One of the seven connection states a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, or the state after a clean logout.
    Disconnected,
    /// TCP+TLS+WebSocket upgrade in progress.
    Connecting,
    /// Noise_XX handshake in progress.
    Handshake,
    /// Handshake complete with no restorable session; waiting on the
    /// primary device.
    AwaitingEnrollment,
    /// Session usable.
    Authenticated,
    /// Waiting on the backoff timer before the next connection attempt.
    Reconnecting,
    /// Graceful shutdown in progress.
    Closing,
}

/// Why a transition happened, attached to every `StateChanged` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionReason {
    /// Caller invoked `connect()`.
    ConnectRequested,
    /// The websocket upgrade completed.
    SocketOpen,
    /// The Noise handshake finished, no prior session restored.
    HandshakeCompleteFresh,
    /// The Noise handshake finished and a prior session was restored.
    HandshakeCompleteRestored,
    /// Enrollment succeeded.
    EnrollmentSucceeded,
    /// Enrollment attempts were exhausted.
    EnrollmentExhausted,
    /// The socket closed without a caller-initiated logout.
    ConnectionLost,
    /// Caller requested logout.
    LogoutRequested,
    /// The backoff timer fired.
    BackoffElapsed,
    /// The configured reconnect attempt cap was reached.
    MaxAttemptsReached,
    /// A transport or protocol error occurred.
    Error(String),
}

/// A single state transition, as emitted on the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State transitioned from.
    pub from: ConnectionState,
    /// State transitioned to.
    pub to: ConnectionState,
    /// Why the transition happened.
    pub reason: TransitionReason,
}

impl ConnectionState {
    /// Whether a request may be sent while in this state.
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authenticated_is_usable() {
        assert!(ConnectionState::Authenticated.is_usable());
        assert!(!ConnectionState::Connecting.is_usable());
        assert!(!ConnectionState::Reconnecting.is_usable());
    }
}
