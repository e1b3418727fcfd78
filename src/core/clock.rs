//! Injectable time source.
//!
//! The backoff timer and enrollment-code expiry logic take a [`Clock`]
//! instead of calling `Instant::now()` directly, so tests can simulate
//! elapsed time deterministically instead of sleeping in real time.

use std::time::Instant;

/// A source of monotonic time.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    /// A clock whose `now()` is manually advanced, for deterministic tests.
    pub struct SimClock {
        base: Instant,
        offset_ms: AtomicU64,
    }

    impl SimClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_ms: AtomicU64::new(0),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.offset_ms
                .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for SimClock {
        fn now(&self) -> Instant {
            self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }
    }
}
