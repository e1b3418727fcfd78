//! End-to-end exercises of the session actor that don't require a live
//! gateway: connection failures against an unreachable endpoint still
//! drive the full state machine, backoff, and event bus.

use std::time::Duration;

use companion_protocol::core::ClientConfigBuilder;
use companion_protocol::events::Event;
use companion_protocol::session::{ConnectionState, SessionActor, TransitionReason};

fn unreachable_config() -> companion_protocol::core::ClientConfig {
    ClientConfigBuilder::new()
        .endpoint_url("ws://127.0.0.1:1/ws")
        .auto_reconnect(true)
        .backoff(Duration::from_millis(10), 1.5, Duration::from_millis(50))
        .build()
        .unwrap()
}

#[tokio::test]
async fn failed_connect_drives_disconnected_to_reconnecting() {
    let config = unreachable_config();
    let events = companion_protocol::events::EventPublisher::new(16);
    let mut subscriber = events.subscribe();
    let handle = SessionActor::spawn(config, None, events);

    handle.connect().await;

    let first = subscriber.recv().await.unwrap();
    match first {
        Event::StateChanged { from, to, reason } => {
            assert_eq!(from, ConnectionState::Disconnected);
            assert_eq!(to, ConnectionState::Connecting);
            assert_eq!(reason, TransitionReason::ConnectRequested);
        }
        other => panic!("unexpected first event: {other:?}"),
    }

    let second = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
        .await
        .expect("connection attempt did not fail in time")
        .unwrap();
    match second {
        Event::StateChanged { from, to, reason } => {
            assert_eq!(from, ConnectionState::Connecting);
            assert_eq!(to, ConnectionState::Reconnecting);
            assert!(matches!(reason, TransitionReason::Error(_)));
        }
        other => panic!("unexpected second event: {other:?}"),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn disconnected_max_attempts_gives_up() {
    let config = ClientConfigBuilder::new()
        .endpoint_url("ws://127.0.0.1:1/ws")
        .auto_reconnect(true)
        .backoff(Duration::from_millis(5), 1.5, Duration::from_millis(20))
        .reconnect_max_attempts(Some(1))
        .build()
        .unwrap();
    let events = companion_protocol::events::EventPublisher::new(16);
    let mut subscriber = events.subscribe();
    let handle = SessionActor::spawn(config, None, events);

    handle.connect().await;

    let mut saw_disconnected_again = false;
    for _ in 0..6 {
        let event = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("expected more events")
            .unwrap();
        if let Event::StateChanged { to: ConnectionState::Disconnected, reason, .. } = event {
            if matches!(reason, TransitionReason::MaxAttemptsReached) {
                saw_disconnected_again = true;
                break;
            }
        }
    }

    assert!(saw_disconnected_again, "expected the actor to give up after exhausting reconnect attempts");
    handle.shutdown().await;
}

#[tokio::test]
async fn reconnect_delay_grows_between_attempts() {
    let config = ClientConfigBuilder::new()
        .endpoint_url("ws://127.0.0.1:1/ws")
        .auto_reconnect(true)
        .backoff(Duration::from_millis(20), 2.0, Duration::from_secs(5))
        .build()
        .unwrap();
    let events = companion_protocol::events::EventPublisher::new(32);
    let mut subscriber = events.subscribe();
    let handle = SessionActor::spawn(config, None, events);

    handle.connect().await;

    let mut backoff_waits = Vec::new();
    let mut last_reconnecting_at: Option<std::time::Instant> = None;
    while backoff_waits.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("expected more events")
            .unwrap();
        match event {
            Event::StateChanged { to: ConnectionState::Reconnecting, .. } => {
                last_reconnecting_at = Some(std::time::Instant::now());
            }
            Event::StateChanged { to: ConnectionState::Connecting, from: ConnectionState::Reconnecting, .. } => {
                if let Some(since) = last_reconnecting_at.take() {
                    backoff_waits.push(since.elapsed());
                }
            }
            _ => {}
        }
    }

    assert!(
        backoff_waits[1] > backoff_waits[0],
        "expected the second backoff wait ({:?}) to exceed the first ({:?})",
        backoff_waits[1],
        backoff_waits[0]
    );
    assert!(
        backoff_waits[2] > backoff_waits[1],
        "expected the third backoff wait ({:?}) to exceed the second ({:?})",
        backoff_waits[2],
        backoff_waits[1]
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn logout_while_disconnected_is_a_no_op_transition() {
    let config = unreachable_config();
    let events = companion_protocol::events::EventPublisher::new(16);
    let handle = SessionActor::spawn(config, None, events);

    handle.logout().await;
    handle.shutdown().await;
}
