//! Run a transfer attempt under the retry policy.

use std::sync::atomic::{AtomicBool, Ordering};

use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f` until it succeeds or the policy says to stop, sleeping the
/// backoff delay between attempts. The closure receives the 0-based attempt
/// index. A set `stop` token short-circuits with `Aborted` without starting
/// another attempt; backoff sleeps are broken into short slices so stop
/// requests are observed promptly.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    stop: &AtomicBool,
    mut f: F,
) -> Result<T, TransferError>
where
    F: FnMut(u32) -> Result<T, TransferError>,
{
    let mut attempt = 0u32;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(TransferError::Aborted);
        }
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::Abort => return Err(e),
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(attempt, error = %e, delay_secs = delay.as_secs(), "retrying transfer");
                    let mut remaining = delay;
                    let slice = std::time::Duration::from_millis(100);
                    while !remaining.is_zero() {
                        if stop.load(Ordering::Relaxed) {
                            return Err(TransferError::Aborted);
                        }
                        let step = remaining.min(slice);
                        std::thread::sleep(step);
                        remaining -= step;
                    }
                    attempt += 1;
                }
            },
        }
    }
}
