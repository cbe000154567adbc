//! Token-bucket speed limiting for transfer loops.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Simple token-bucket limiter shared by all transfers of an asset.
///
/// Callers report each chunk as it arrives; when the observed rate within
/// the current one-second window exceeds the cap, the caller sleeps long
/// enough to fall back under it. Holding the lock across the sleep is
/// intentional: the cap is global, so concurrent writers queue behind it.
pub struct SpeedLimiter {
    max_bytes_per_sec: u64,
    window: Mutex<Window>,
}

struct Window {
    started: Instant,
    bytes: u64,
}

impl SpeedLimiter {
    pub fn new(max_bytes_per_sec: u64) -> Self {
        Self {
            max_bytes_per_sec: max_bytes_per_sec.max(1),
            window: Mutex::new(Window {
                started: Instant::now(),
                bytes: 0,
            }),
        }
    }

    /// Account for `n` bytes, sleeping if the window rate is over the cap.
    pub fn throttle(&self, n: usize) {
        let mut w = self.window.lock().unwrap();
        w.bytes = w.bytes.saturating_add(n as u64);
        let elapsed = w.started.elapsed();
        let expected = Duration::from_secs_f64(w.bytes as f64 / self.max_bytes_per_sec as f64);
        if elapsed < expected {
            std::thread::sleep(expected - elapsed);
        }
        if w.started.elapsed() >= Duration::from_secs(1) {
            w.bytes = 0;
            w.started = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_paces_to_the_cap() {
        let limiter = SpeedLimiter::new(100_000);
        let start = Instant::now();
        // 20 KB at 100 KB/s should take roughly 200 ms.
        limiter.throttle(10_000);
        limiter.throttle(10_000);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn unthrottled_small_writes_do_not_sleep_noticeably() {
        let limiter = SpeedLimiter::new(u64::MAX);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.throttle(1024);
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
