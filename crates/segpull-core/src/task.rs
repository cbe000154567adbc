//! Segment task and result records.
//!
//! A `SegmentTask` describes one remote object to fetch to one local file.
//! Tasks are created by the batch coordinator, held by the priority queue
//! until admission, then owned by the running transfer. At terminal state
//! the task moves into a `TransferResult`, created exactly once.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Admission priority for a segment task. Ordering is by urgency
/// (`Urgent` > `High` > `Normal` > `Low`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// One step less urgent, saturating at `Low`.
    pub fn lowered(self) -> Self {
        match self {
            Priority::Urgent => Priority::High,
            Priority::High => Priority::Normal,
            Priority::Normal | Priority::Low => Priority::Low,
        }
    }

    /// The more urgent of `self` and `other`.
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }
}

/// Default chunk size for streaming reads (64 KiB, matching typical
/// media-segment sizes).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// One segment download: URL plus destination path plus scheduling knobs.
///
/// Immutable after creation; urgent insertion elevates a queue entry's
/// effective priority without touching the task record itself.
#[derive(Debug, Clone)]
pub struct SegmentTask {
    /// Unique per asset + index (e.g. `"asset1_segment_42"`).
    pub id: String,
    pub url: String,
    /// Final destination path. The transfer writes to a `.part` sibling and
    /// renames on success.
    pub destination: PathBuf,
    pub priority: Priority,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub chunk_size: usize,
    /// When set and the expected size exceeds the large-object threshold,
    /// writes are batched in memory and flushed in larger blocks.
    pub large_object_mode: bool,
}

impl SegmentTask {
    pub fn new(id: impl Into<String>, url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            destination: destination.into(),
            priority: Priority::Normal,
            max_retries: 3,
            chunk_size: DEFAULT_CHUNK_SIZE,
            large_object_mode: true,
        }
    }
}

/// Terminal outcome of one task: success, exhausted retries, or fatal error.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub task: SegmentTask,
    pub success: bool,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
    /// Human-readable error classification when `success` is false.
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Live snapshot of a running transfer. Written only by the owning transfer
/// (at a bounded refresh rate), read by monitors. Exists iff the task is
/// currently active.
#[derive(Debug, Clone)]
pub struct ActiveTransferInfo {
    pub task_id: String,
    pub url: String,
    pub destination: PathBuf,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
    pub progress_fraction: f64,
    pub started_at: Instant,
    /// Instantaneous speed in bytes/sec (bytes so far / elapsed since start).
    pub current_speed: f64,
}

impl ActiveTransferInfo {
    pub fn for_task(task: &SegmentTask) -> Self {
        Self {
            task_id: task.id.clone(),
            url: task.url.clone(),
            destination: task.destination.clone(),
            bytes_downloaded: 0,
            bytes_total: 0,
            progress_fraction: 0.0,
            started_at: Instant::now(),
            current_speed: 0.0,
        }
    }

    /// Update the snapshot in place from the transfer loop.
    pub fn update(&mut self, bytes_downloaded: u64, bytes_total: u64, speed: f64) {
        self.bytes_downloaded = bytes_downloaded;
        self.bytes_total = bytes_total;
        self.progress_fraction = if bytes_total > 0 {
            (bytes_downloaded as f64 / bytes_total as f64).min(1.0)
        } else {
            0.0
        };
        self.current_speed = speed;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
