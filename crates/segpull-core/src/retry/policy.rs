//! Exponential backoff policy for transfer attempts.

use std::time::Duration;

use super::error::TransferError;

/// Decision after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up; surface the error as the terminal result.
    Abort,
    /// Sleep for the given delay, then attempt again.
    RetryAfter(Duration),
}

/// Bounded retry with exponential backoff.
///
/// A task is attempted at most `max_retries + 1` times; the wait before
/// retry `n` (0-based attempt index) is `2^n` seconds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decide what to do after `attempt` (0-based) failed with `error`.
    ///
    /// Fatal errors abort immediately without consuming further retries;
    /// everything else retries until the attempt budget is spent.
    pub fn decide(&self, attempt: u32, error: &TransferError) -> RetryDecision {
        if error.is_fatal() || attempt >= self.max_retries {
            return RetryDecision::Abort;
        }
        RetryDecision::RetryAfter(Self::backoff_delay(attempt))
    }

    /// `2^attempt` seconds, with the shift clamped to keep the arithmetic
    /// sane for absurd attempt counts.
    pub fn backoff_delay(attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::error::NetworkKind;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(RetryPolicy::backoff_delay(0), Duration::from_secs(1));
        assert_eq!(RetryPolicy::backoff_delay(1), Duration::from_secs(2));
        assert_eq!(RetryPolicy::backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn retryable_until_budget_spent() {
        let p = RetryPolicy::new(2);
        let e = TransferError::Network(NetworkKind::Timeout);
        assert!(matches!(p.decide(0, &e), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(1, &e), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(2, &e), RetryDecision::Abort);
    }

    #[test]
    fn fatal_aborts_on_first_attempt() {
        let p = RetryPolicy::new(5);
        let io = TransferError::LocalIo(std::io::Error::other("permission denied"));
        assert_eq!(p.decide(0, &io), RetryDecision::Abort);
        assert_eq!(p.decide(0, &TransferError::Http(404)), RetryDecision::Abort);
    }

    #[test]
    fn unknown_errors_retry_like_network_errors() {
        let p = RetryPolicy::new(1);
        let e = TransferError::Unknown("curl said something odd".into());
        assert!(matches!(p.decide(0, &e), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(1, &e), RetryDecision::Abort);
    }
}
