//! Enrollment bookkeeping shared by the scanned-image and typed-code flows.
//!
//! The session actor owns the socket and credential, so it drives these
//! flows directly; this module holds the pure, clock-driven decisions
//! (when a code has expired, whether attempts are exhausted, whether a
//! destination identifier is well-formed) so they can be tested without a
//! live connection.

use std::time::{Duration, Instant};

use crate::core::EnrollmentError;

/// Tracks the scanned-image enrollment code's retry budget and expiry.
///
/// Replaced wholesale on every refresh; the session actor holds at most
/// one of these at a time, for the duration of `AwaitingEnrollment`.
pub struct ScannedEnrollmentTracker {
    attempt: u32,
    max_attempts: u32,
    expires_at: Instant,
}

impl ScannedEnrollmentTracker {
    /// Start tracking the first code, issued at `now` and expiring after
    /// `timeout`.
    pub fn start(now: Instant, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts,
            expires_at: now + timeout,
        }
    }

    /// The current attempt number (1-indexed).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// When the current code expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the retry budget has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Record that the current code expired and a fresh one was requested.
    /// Panics if called after [`is_exhausted`](Self::is_exhausted) returns
    /// true; the caller is expected to check first.
    pub fn advance(&mut self, now: Instant, timeout: Duration) {
        assert!(!self.is_exhausted(), "advanced an exhausted enrollment tracker");
        self.attempt += 1;
        self.expires_at = now + timeout;
    }

    /// Build the terminal error once the retry budget is exhausted.
    pub fn exhausted_error(&self) -> EnrollmentError {
        EnrollmentError::Exhausted { attempts: self.attempt }
    }
}

/// Validate a typed-code destination identifier: non-empty, digits only.
pub fn validate_typed_code_destination(destination: &str) -> Result<(), EnrollmentError> {
    if destination.is_empty() || !destination.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EnrollmentError::InvalidDestination(destination.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_advances_and_exhausts() {
        let now = Instant::now();
        let timeout = Duration::from_secs(30);
        let mut tracker = ScannedEnrollmentTracker::start(now, timeout, 3);
        assert_eq!(tracker.attempt(), 1);
        assert!(!tracker.is_exhausted());

        tracker.advance(now + timeout, timeout);
        assert_eq!(tracker.attempt(), 2);
        assert!(!tracker.is_exhausted());

        tracker.advance(now + timeout + timeout, timeout);
        assert_eq!(tracker.attempt(), 3);
        assert!(tracker.is_exhausted());
    }

    #[test]
    fn exhausted_error_reports_attempt_count() {
        let now = Instant::now();
        let tracker = ScannedEnrollmentTracker::start(now, Duration::from_secs(10), 1);
        assert!(tracker.is_exhausted());
        match tracker.exhausted_error() {
            EnrollmentError::Exhausted { attempts } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn destination_must_be_digits_only() {
        assert!(validate_typed_code_destination("15551234567").is_ok());
        assert!(validate_typed_code_destination("").is_err());
        assert!(validate_typed_code_destination("+1 555").is_err());
    }
}
