//! Rolling performance counters and telemetry snapshot types.

use serde::Serialize;
use std::time::Duration;

/// Counters accumulated by a scheduler as transfers finish. Lives under the
/// scheduler's shared lock.
#[derive(Debug, Default)]
pub struct PerfCounters {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub total_elapsed: Duration,
    pub total_bytes: u64,
    pub peak_concurrent: usize,
}

impl PerfCounters {
    /// Track the high-water mark of simultaneously active transfers.
    pub fn note_admission(&mut self, active_now: usize) {
        if active_now > self.peak_concurrent {
            self.peak_concurrent = active_now;
        }
    }

    pub fn record_completion(&mut self, success: bool, elapsed: Duration, bytes: u64) {
        self.total_tasks += 1;
        if success {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
        self.total_elapsed += elapsed;
        self.total_bytes += bytes;
    }

    pub fn snapshot(&self, current_active: usize) -> PerformanceStats {
        let success_rate = if self.total_tasks > 0 {
            self.successful_tasks as f64 / self.total_tasks as f64
        } else {
            0.0
        };
        let elapsed_secs = self.total_elapsed.as_secs_f64();
        let average_elapsed_secs = if self.total_tasks > 0 {
            elapsed_secs / self.total_tasks as f64
        } else {
            0.0
        };
        let average_speed_bytes_per_sec = if elapsed_secs > 0.0 {
            self.total_bytes as f64 / elapsed_secs
        } else {
            0.0
        };
        PerformanceStats {
            total_tasks: self.total_tasks,
            successful_tasks: self.successful_tasks,
            failed_tasks: self.failed_tasks,
            success_rate,
            average_elapsed_secs,
            average_speed_bytes_per_sec,
            total_bytes: self.total_bytes,
            peak_concurrent: self.peak_concurrent,
            current_active,
        }
    }
}

/// Point-in-time performance view of one scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// Fraction in [0, 1].
    pub success_rate: f64,
    pub average_elapsed_secs: f64,
    pub average_speed_bytes_per_sec: f64,
    pub total_bytes: u64,
    pub peak_concurrent: usize,
    pub current_active: usize,
}

/// Queue occupancy view of one scheduler.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub concurrency_limit: usize,
}

/// Byte-level summary over a scheduler's completed results.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletedSummary {
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub bytes_total: u64,
    pub bytes_downloaded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_snapshot() {
        let mut c = PerfCounters::default();
        c.note_admission(1);
        c.note_admission(3);
        c.note_admission(2);
        c.record_completion(true, Duration::from_secs(2), 2_000_000);
        c.record_completion(false, Duration::from_secs(1), 0);
        let s = c.snapshot(1);
        assert_eq!(s.total_tasks, 2);
        assert_eq!(s.successful_tasks, 1);
        assert_eq!(s.failed_tasks, 1);
        assert!((s.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(s.peak_concurrent, 3);
        assert_eq!(s.current_active, 1);
        assert!((s.average_speed_bytes_per_sec - 2_000_000.0 / 3.0).abs() < 1.0);
    }

    #[test]
    fn empty_counters_have_zero_rates() {
        let c = PerfCounters::default();
        let s = c.snapshot(0);
        assert_eq!(s.success_rate, 0.0);
        assert_eq!(s.average_speed_bytes_per_sec, 0.0);
    }
}
