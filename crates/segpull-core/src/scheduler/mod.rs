//! Per-asset transfer scheduler.
//!
//! Owns the pending priority queue, the active-transfer map, and the
//! completed-results map (one lock discipline for all three). `start`
//! launches the admission loop; `stop` is cooperative: no new admissions,
//! in-flight transfers run to their natural end.

mod admission;
mod stats;

pub use stats::{CompletedSummary, PerfCounters, PerformanceStats, QueueStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::adaptive::AdaptiveConcurrency;
use crate::event::SharedSink;
use crate::queue::PriorityQueue;
use crate::task::{ActiveTransferInfo, SegmentTask, TransferResult};
use crate::transfer::{SpeedLimiter, TransferOptions};

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Bounded wait for the admission loop to acknowledge a stop request.
const STOP_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a scheduler's threads share.
pub(crate) struct SchedulerInner {
    pub(crate) asset_id: String,
    pub(crate) queue: PriorityQueue,
    pub(crate) limit: Arc<AtomicUsize>,
    pub(crate) stop: AtomicBool,
    pub(crate) transfer_opts: TransferOptions,
    pub(crate) limiter: Option<Arc<SpeedLimiter>>,
    pub(crate) events: SharedSink,
    pub(crate) adaptive: Option<Arc<AdaptiveConcurrency>>,
    pub(crate) shared: Mutex<Shared>,
}

/// State under the single per-scheduler lock. A task id lives in exactly
/// one of {queue, active, completed} at any instant.
pub(crate) struct Shared {
    pub(crate) lifecycle: SchedulerState,
    pub(crate) active: HashMap<String, ActiveTransferInfo>,
    pub(crate) completed: HashMap<String, TransferResult>,
    pub(crate) counters: PerfCounters,
}

/// Construction parameters for one asset's scheduler.
pub struct SchedulerOptions {
    pub asset_id: String,
    /// Starting concurrency when no adaptive controller is attached.
    pub concurrency: usize,
    pub transfer: TransferOptions,
    pub limiter: Option<Arc<SpeedLimiter>>,
    pub events: SharedSink,
    pub adaptive: Option<Arc<AdaptiveConcurrency>>,
}

pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    /// Ack channel for the running admission loop, if any.
    admission_ack: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        let limit = match &options.adaptive {
            Some(a) => a.limit_handle(),
            None => Arc::new(AtomicUsize::new(options.concurrency.max(1))),
        };
        let inner = SchedulerInner {
            asset_id: options.asset_id,
            queue: PriorityQueue::new(),
            limit,
            stop: AtomicBool::new(false),
            transfer_opts: options.transfer,
            limiter: options.limiter,
            events: options.events,
            adaptive: options.adaptive,
            shared: Mutex::new(Shared {
                lifecycle: SchedulerState::Created,
                active: HashMap::new(),
                completed: HashMap::new(),
                counters: PerfCounters::default(),
            }),
        };
        Self {
            inner: Arc::new(inner),
            admission_ack: Mutex::new(None),
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.inner.asset_id
    }

    /// Add a task at its own priority.
    pub fn enqueue(&self, task: SegmentTask) {
        self.inner.queue.enqueue(task);
    }

    /// Add a task at urgent effective priority (the record is untouched).
    pub fn enqueue_urgent(&self, task: SegmentTask) {
        self.inner.queue.enqueue_urgent(task);
    }

    /// Launch the admission loop. Idempotent while running.
    pub fn start(&self) {
        {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.lifecycle == SchedulerState::Running {
                return;
            }
            shared.lifecycle = SchedulerState::Running;
        }
        self.inner.stop.store(false, Ordering::Relaxed);
        let (ack_tx, ack_rx) = mpsc::channel();
        *self.admission_ack.lock().unwrap() = Some(ack_rx);
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || admission::run_admission_loop(inner, ack_tx));
    }

    /// Signal the admission loop to exit and wait briefly for it. In-flight
    /// transfers are not interrupted here; they observe the stop token at
    /// their own chunk boundaries.
    pub fn stop(&self) {
        {
            let mut shared = self.inner.shared.lock().unwrap();
            match shared.lifecycle {
                SchedulerState::Running => shared.lifecycle = SchedulerState::Stopping,
                SchedulerState::Created => {
                    shared.lifecycle = SchedulerState::Stopped;
                    return;
                }
                SchedulerState::Stopping | SchedulerState::Stopped => return,
            }
        }
        self.inner.stop.store(true, Ordering::Relaxed);
        if let Some(ack) = self.admission_ack.lock().unwrap().take() {
            if ack.recv_timeout(STOP_ACK_TIMEOUT).is_err() {
                tracing::warn!(
                    asset_id = %self.inner.asset_id,
                    "admission loop did not acknowledge stop in time"
                );
            }
        }
        self.inner.shared.lock().unwrap().lifecycle = SchedulerState::Stopped;
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.shared.lock().unwrap().lifecycle
    }

    pub fn current_limit(&self) -> usize {
        self.inner.limit.load(Ordering::Relaxed)
    }

    /// Change the concurrency bound; affects subsequent admissions only.
    pub fn set_concurrency_limit(&self, limit: usize) {
        self.inner.limit.store(limit.max(1), Ordering::Relaxed);
    }

    /// Drop all pending tasks, returning how many were discarded.
    pub fn clear_pending(&self) -> usize {
        self.inner.queue.clear_pending()
    }

    /// No pending work and no running transfers.
    pub fn is_idle(&self) -> bool {
        self.inner.queue.is_empty() && self.inner.shared.lock().unwrap().active.is_empty()
    }

    pub fn queue_status(&self) -> QueueStatus {
        let shared = self.inner.shared.lock().unwrap();
        QueueStatus {
            queued: self.inner.queue.len(),
            active: shared.active.len(),
            completed: shared.completed.len(),
            concurrency_limit: self.inner.limit.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of all running transfers.
    pub fn active_downloads_info(&self) -> Vec<ActiveTransferInfo> {
        self.inner
            .shared
            .lock()
            .unwrap()
            .active
            .values()
            .cloned()
            .collect()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let shared = self.inner.shared.lock().unwrap();
        let active_now = shared.active.len();
        shared.counters.snapshot(active_now)
    }

    /// Terminal result for a task, if it has one.
    pub fn result(&self, task_id: &str) -> Option<TransferResult> {
        self.inner.shared.lock().unwrap().completed.get(task_id).cloned()
    }

    /// Byte-level rollup over all completed results.
    pub fn completed_summary(&self) -> CompletedSummary {
        let shared = self.inner.shared.lock().unwrap();
        let mut summary = CompletedSummary {
            completed: shared.completed.len(),
            ..Default::default()
        };
        for r in shared.completed.values() {
            if r.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            summary.bytes_total += r.bytes_total;
            summary.bytes_downloaded += r.bytes_downloaded;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;

    fn idle_scheduler() -> Scheduler {
        Scheduler::new(SchedulerOptions {
            asset_id: "test".into(),
            concurrency: 2,
            transfer: TransferOptions::default(),
            limiter: None,
            events: Arc::new(NullSink),
            adaptive: None,
        })
    }

    #[test]
    fn lifecycle_created_running_stopped() {
        let s = idle_scheduler();
        assert_eq!(s.state(), SchedulerState::Created);
        s.start();
        assert_eq!(s.state(), SchedulerState::Running);
        // start is idempotent while running
        s.start();
        assert_eq!(s.state(), SchedulerState::Running);
        s.stop();
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn stop_without_start_goes_straight_to_stopped() {
        let s = idle_scheduler();
        s.stop();
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn stop_is_reentrant() {
        let s = idle_scheduler();
        s.start();
        s.stop();
        s.stop();
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn queue_status_counts_pending() {
        let s = idle_scheduler();
        s.enqueue(SegmentTask::new("a", "http://example.com/a.ts", "/tmp/a.ts"));
        s.enqueue(SegmentTask::new("b", "http://example.com/b.ts", "/tmp/b.ts"));
        let qs = s.queue_status();
        assert_eq!(qs.queued, 2);
        assert_eq!(qs.active, 0);
        assert_eq!(qs.completed, 0);
        assert_eq!(qs.concurrency_limit, 2);
        assert_eq!(s.clear_pending(), 2);
        assert!(s.is_idle());
    }

    #[test]
    fn set_concurrency_limit_floors_at_one() {
        let s = idle_scheduler();
        s.set_concurrency_limit(0);
        assert_eq!(s.current_limit(), 1);
        s.set_concurrency_limit(8);
        assert_eq!(s.current_limit(), 8);
    }
}
