//! Exponential backoff with jitter for reconnection attempts.

use std::time::Duration;

use rand::Rng;

/// Computes successive backoff delays: `min(initial * factor^attempt, max)`,
/// with symmetric jitter applied, resetting whenever a connection succeeds.
pub struct Backoff {
    initial: Duration,
    factor: f64,
    max: Duration,
    jitter: f64,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Backoff {
    /// Construct a new backoff sequence.
    pub fn new(initial: Duration, factor: f64, max: Duration, jitter: f64, max_attempts: Option<u32>) -> Self {
        Self {
            initial,
            factor,
            max,
            jitter,
            max_attempts,
            attempt: 0,
        }
    }

    /// Whether the attempt cap has been reached.
    pub fn exhausted(&self) -> bool {
        matches!(self.max_attempts, Some(cap) if self.attempt >= cap)
    }

    /// Compute the next delay and advance the attempt counter.
    ///
    /// Returns `None` once `exhausted()` would be true.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let base_secs = self.initial.as_secs_f64() * self.factor.powi(self.attempt as i32);
        let base_secs = base_secs.min(self.max.as_secs_f64());
        self.attempt += 1;

        let jitter_span = base_secs * self.jitter;
        let jittered = if jitter_span > 0.0 {
            rand::thread_rng().gen_range((base_secs - jitter_span).max(0.0)..=(base_secs + jitter_span))
        } else {
            base_secs
        };
        Some(Duration::from_secs_f64(jittered))
    }

    /// Reset the attempt counter, called after a successful authenticated
    /// frame.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of attempts made since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps_at_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(10), 0.0, None);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(8)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(Duration::from_secs(10), 1.5, Duration::from_secs(60), 0.2, None);
        let delay = backoff.next_delay().unwrap().as_secs_f64();
        assert!((8.0..=12.0).contains(&delay));
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut backoff = Backoff::new(Duration::from_millis(1), 1.5, Duration::from_secs(1), 0.0, Some(2));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(10), 0.0, None);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }
}
