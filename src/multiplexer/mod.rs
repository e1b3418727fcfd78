//! Request/response multiplexing over the encrypted frame stream.
//!
//! Owned exclusively by the session actor: tags are allocated, results
//! delivered, and timeouts/cancellations applied all from that single task,
//! per the crate's single-writer concurrency model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

use crate::core::MultiplexError;
use crate::crypto::fill_random;

/// Monotonically increasing counter plus random suffix, producing tags of
/// the form `"<monotonic_hex>-<random_hex>"`.
pub struct TagAllocator {
    counter: AtomicU64,
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagAllocator {
    /// Construct a fresh allocator, starting its counter at zero.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Allocate the next unique tag.
    pub fn next_tag(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut random_bytes = [0u8; 4];
        fill_random(&mut random_bytes);
        let random_hex: String = random_bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("{counter:x}-{random_hex}")
    }
}

/// One in-flight request's write-once result slot.
struct PendingRequest {
    sender: oneshot::Sender<Result<Vec<u8>, MultiplexError>>,
}

/// Tracks every in-flight request for one connection instance.
///
/// No pending entry ever survives a reconnection: the session actor calls
/// [`Multiplexer::drain`] with `Disconnected` before tearing down a socket.
#[derive(Default)]
pub struct Multiplexer {
    pending: HashMap<String, PendingRequest>,
    tags: TagAllocator,
}

impl Multiplexer {
    /// Construct an empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request, returning its tag and the receiver
    /// half the caller awaits (typically wrapped in `tokio::time::timeout`).
    pub fn register(&mut self) -> (String, oneshot::Receiver<Result<Vec<u8>, MultiplexError>>) {
        let (sender, receiver) = oneshot::channel();
        let tag = self.register_with(sender);
        (tag, receiver)
    }

    /// Register a pending request using a caller-supplied result sender,
    /// e.g. one forwarded from outside the session actor via a command.
    pub fn register_with(&mut self, sender: oneshot::Sender<Result<Vec<u8>, MultiplexError>>) -> String {
        let tag = self.tags.next_tag();
        self.pending.insert(tag.clone(), PendingRequest { sender });
        tag
    }

    /// Complete a pending request with its reply. Replies with no matching
    /// tag are silently dropped (the tag already timed out, was cancelled,
    /// or never existed).
    pub fn complete(&mut self, tag: &str, reply: Vec<u8>) {
        if let Some(entry) = self.pending.remove(tag) {
            let _ = entry.sender.send(Ok(reply));
        }
    }

    /// Explicitly cancel a pending request, e.g. because the caller's await
    /// was cancelled. A no-op if the tag is already gone.
    pub fn cancel(&mut self, tag: &str) {
        self.pending.remove(tag);
    }

    /// Complete a pending request with `Timeout`, removing it. Called by
    /// the session actor's own deadline bookkeeping, not by the oneshot
    /// timeout itself (which the caller observes independently).
    pub fn expire(&mut self, tag: &str) {
        if let Some(entry) = self.pending.remove(tag) {
            let _ = entry.sender.send(Err(MultiplexError::Timeout));
        }
    }

    /// Drain every pending request with `Disconnected`, called whenever the
    /// connection drops.
    pub fn drain_disconnected(&mut self) {
        for (_, entry) in self.pending.drain() {
            let _ = entry.sender.send(Err(MultiplexError::Disconnected));
        }
    }

    /// Drop pending entries whose caller already dropped their receiver.
    /// Called opportunistically by the session actor; cancellation has no
    /// dedicated wire signal, so this is how a cancelled await's slot is
    /// eventually reclaimed.
    pub fn purge_cancelled(&mut self) {
        self.pending.retain(|_, entry| !entry.sender.is_closed());
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether there are no requests in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_and_monotonic() {
        let allocator = TagAllocator::new();
        let a = allocator.next_tag();
        let b = allocator.next_tag();
        assert_ne!(a, b);
        assert!(a.starts_with('0'));
        assert!(b.starts_with('1'));
    }

    #[test]
    fn tag_random_suffix_is_well_formed_hex() {
        let allocator = TagAllocator::new();
        let tag = allocator.next_tag();
        let (_, suffix) = tag.split_once('-').expect("tag has a counter-random split");
        let decoded = hex::decode(suffix).expect("random suffix must be valid hex");
        assert_eq!(decoded.len(), 4);
    }

    #[tokio::test]
    async fn reply_is_delivered_to_matching_tag() {
        let mut mux = Multiplexer::new();
        let (tag, receiver) = mux.register();
        mux.complete(&tag, b"reply".to_vec());
        let result = receiver.await.unwrap();
        assert_eq!(result.unwrap(), b"reply");
    }

    #[tokio::test]
    async fn reply_with_unknown_tag_is_dropped() {
        let mut mux = Multiplexer::new();
        let (_tag, receiver) = mux.register();
        mux.complete("not-a-real-tag", b"reply".to_vec());
        assert_eq!(mux.len(), 1);
        drop(receiver);
    }

    #[tokio::test]
    async fn expired_request_resolves_with_timeout() {
        let mut mux = Multiplexer::new();
        let (tag, receiver) = mux.register();
        mux.expire(&tag);
        let result = receiver.await.unwrap();
        assert!(matches!(result, Err(MultiplexError::Timeout)));
        assert!(mux.is_empty());
    }

    #[tokio::test]
    async fn disconnect_drains_all_pending_with_disconnected() {
        let mut mux = Multiplexer::new();
        let (_tag1, receiver1) = mux.register();
        let (_tag2, receiver2) = mux.register();
        mux.drain_disconnected();
        assert!(matches!(receiver1.await.unwrap(), Err(MultiplexError::Disconnected)));
        assert!(matches!(receiver2.await.unwrap(), Err(MultiplexError::Disconnected)));
        assert!(mux.is_empty());
    }

    #[tokio::test]
    async fn cancellation_removes_entry_silently() {
        let mut mux = Multiplexer::new();
        let (tag, receiver) = mux.register();
        mux.cancel(&tag);
        assert!(mux.is_empty());
        drop(receiver);
    }

    #[tokio::test]
    async fn purge_reclaims_dropped_receivers() {
        let mut mux = Multiplexer::new();
        let (_tag, receiver) = mux.register();
        drop(receiver);
        mux.purge_cancelled();
        assert!(mux.is_empty());
    }
}
