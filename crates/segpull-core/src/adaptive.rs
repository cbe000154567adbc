//! Adaptive concurrency control from rolling transfer performance.
//!
//! Workers record one sample per finished transfer; at a fixed cadence the
//! controller looks at the most recent samples and nudges the shared
//! concurrency limit up or down by a small step. New limits affect
//! admissions only, never transfers already in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Retain at most this many samples, trimmed oldest-first.
const WINDOW_CAPACITY: usize = 100;

/// Adjustment decisions look at the most recent samples only.
const RECENT_SAMPLES: usize = 10;

/// Do not adjust until at least this many samples exist.
const MIN_SAMPLES: usize = 3;

/// Step sizes: grow fast when healthy, back off gently when not.
const INCREASE_STEP: usize = 2;
const DECREASE_STEP: usize = 1;

/// Thresholds on the recent window.
const GOOD_SUCCESS_RATE: f64 = 0.9;
const BAD_SUCCESS_RATE: f64 = 0.7;
const FAST_RESPONSE_SECS: f64 = 2.0;
const SLOW_RESPONSE_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy)]
struct Sample {
    success: bool,
    /// Bytes per second achieved by the transfer.
    speed: f64,
    /// Wall-clock seconds from admission to terminal state.
    response_time: f64,
}

/// Controller state shared with a scheduler via the `Arc<AtomicUsize>` limit.
pub struct AdaptiveConcurrency {
    min_workers: usize,
    max_workers: usize,
    limit: Arc<AtomicUsize>,
    interval: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    window: VecDeque<Sample>,
    last_adjusted: Instant,
}

impl AdaptiveConcurrency {
    /// Create a controller bounded to `[min_workers, max_workers]`, starting
    /// at `initial`, adjusting at most once per `interval`.
    pub fn new(min_workers: usize, max_workers: usize, initial: usize, interval: Duration) -> Self {
        let min = min_workers.max(1);
        let max = max_workers.max(min);
        let start = initial.clamp(min, max);
        Self {
            min_workers: min,
            max_workers: max,
            limit: Arc::new(AtomicUsize::new(start)),
            interval,
            inner: Mutex::new(Inner {
                window: VecDeque::new(),
                last_adjusted: Instant::now(),
            }),
        }
    }

    /// The live limit cell, shared with the scheduler's admission loop.
    pub fn limit_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.limit)
    }

    pub fn current_limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Record one finished transfer.
    pub fn record(&self, success: bool, speed: f64, response_time: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.window.push_back(Sample {
            success,
            speed,
            response_time,
        });
        while inner.window.len() > WINDOW_CAPACITY {
            inner.window.pop_front();
        }
    }

    /// Adjust if the cadence interval has elapsed. Returns `(old, new)` when
    /// the limit changed. Cheap to call from every admission iteration.
    pub fn maybe_adjust(&self) -> Option<(usize, usize)> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.last_adjusted.elapsed() < self.interval {
                return None;
            }
            inner.last_adjusted = Instant::now();
        }
        self.adjust()
    }

    /// Apply the adjustment rules immediately (cadence handled by
    /// `maybe_adjust`). Returns `(old, new)` when the limit changed.
    pub fn adjust(&self) -> Option<(usize, usize)> {
        let (success_rate, avg_response) = {
            let inner = self.inner.lock().unwrap();
            if inner.window.len() < MIN_SAMPLES {
                return None;
            }
            let recent: Vec<Sample> = inner
                .window
                .iter()
                .rev()
                .take(RECENT_SAMPLES)
                .copied()
                .collect();
            let n = recent.len() as f64;
            let success_rate = recent.iter().filter(|s| s.success).count() as f64 / n;
            let avg_response = recent.iter().map(|s| s.response_time).sum::<f64>() / n;
            (success_rate, avg_response)
        };

        let current = self.limit.load(Ordering::Relaxed);
        let new = if success_rate > GOOD_SUCCESS_RATE
            && avg_response < FAST_RESPONSE_SECS
            && current < self.max_workers
        {
            (current + INCREASE_STEP).min(self.max_workers)
        } else if (success_rate < BAD_SUCCESS_RATE || avg_response > SLOW_RESPONSE_SECS)
            && current > self.min_workers
        {
            current.saturating_sub(DECREASE_STEP).max(self.min_workers)
        } else {
            current
        };

        if new == current {
            return None;
        }
        self.limit.store(new, Ordering::Relaxed);
        tracing::info!(
            old = current,
            new,
            success_rate,
            avg_response_secs = avg_response,
            "adjusted concurrency limit"
        );
        Some((current, new))
    }

    /// Average speed over the recent window (bytes/sec), for telemetry.
    pub fn recent_average_speed(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        if inner.window.is_empty() {
            return 0.0;
        }
        let recent: Vec<f64> = inner
            .window
            .iter()
            .rev()
            .take(RECENT_SAMPLES)
            .map(|s| s.speed)
            .collect();
        recent.iter().sum::<f64>() / recent.len() as f64
    }
}
