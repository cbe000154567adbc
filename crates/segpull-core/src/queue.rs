//! Priority queue for pending segment tasks.
//!
//! Strict priority ordering (`Urgent` > `High` > `Normal` > `Low`), FIFO
//! within a priority level by submission sequence. Safe for concurrent
//! enqueue and dequeue from multiple threads; a task is handed to exactly
//! one dequeuer.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::task::{Priority, SegmentTask};

/// Heap entry: effective priority first, then submission order.
///
/// The effective priority may be higher than `task.priority` (urgent
/// insertion); the task record is never mutated for queue placement.
struct QueueEntry {
    effective: Priority,
    seq: u64,
    task: SegmentTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.effective == other.effective && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority wins; older submission wins within a level.
        self.effective
            .cmp(&other.effective)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Thread-safe priority queue of pending tasks.
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    available: Condvar,
    next_seq: AtomicU64,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    fn push(&self, effective: Priority, task: SegmentTask) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut heap = self.heap.lock().unwrap();
        heap.push(QueueEntry {
            effective,
            seq,
            task,
        });
        self.available.notify_one();
    }

    /// Enqueue a task at its own priority.
    pub fn enqueue(&self, task: SegmentTask) {
        self.push(task.priority, task);
    }

    /// Enqueue a task at `Urgent` effective priority. The task record keeps
    /// its submitted priority for bookkeeping.
    pub fn enqueue_urgent(&self, task: SegmentTask) {
        self.push(Priority::Urgent, task);
    }

    /// Pop the highest-priority task without blocking.
    pub fn try_dequeue(&self) -> Option<SegmentTask> {
        self.heap.lock().unwrap().pop().map(|e| e.task)
    }

    /// Pop the highest-priority task, waiting up to `timeout` for one to
    /// arrive. Returns `None` on timeout.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<SegmentTask> {
        let mut heap = self.heap.lock().unwrap();
        if heap.is_empty() {
            let (guard, result) = self
                .available
                .wait_timeout_while(heap, timeout, |h| h.is_empty())
                .unwrap();
            heap = guard;
            if result.timed_out() && heap.is_empty() {
                return None;
            }
        }
        heap.pop().map(|e| e.task)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending tasks, returning how many were discarded. Running
    /// transfers are unaffected.
    pub fn clear_pending(&self) -> usize {
        let mut heap = self.heap.lock().unwrap();
        let n = heap.len();
        heap.clear();
        n
    }
}
