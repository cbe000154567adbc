//! Resumable single-segment transfer.
//!
//! One call fetches one remote segment to one local file: partial-content
//! negotiation against a `.part` sibling, chunked writes (batched for large
//! objects), bounded-rate progress reporting, optional token-bucket speed
//! limiting, and atomic rename on success.

mod fetch;
mod headers;
mod probe;
mod sink;
mod throttle;

pub use headers::browser_headers;
pub use probe::probe_size;
pub use throttle::SpeedLimiter;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::retry::TransferError;
use crate::task::SegmentTask;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Bytes above which large-object-mode tasks switch to batched writes.
pub const LARGE_OBJECT_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Path for the in-progress file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// What a completed transfer reports back.
#[derive(Debug, Clone, Copy)]
pub struct TransferOutcome {
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

/// Per-request knobs, shared by all transfers of a scheduler.
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// Read stall budget: the transfer fails with a timeout when no data
    /// arrives for this long.
    pub read_timeout: Duration,
    pub large_object_threshold: u64,
    /// Minimum interval between live-snapshot updates.
    pub progress_interval: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            large_object_threshold: LARGE_OBJECT_THRESHOLD,
            progress_interval: Duration::from_millis(500),
        }
    }
}

/// Fetch one segment to its destination.
///
/// A non-empty destination short-circuits to success with its size and no
/// network activity; a `.part` sibling resumes via a byte-range request.
/// `progress` receives `(bytes_downloaded, bytes_total, speed)` at most
/// every `progress_interval`. A set `stop` token aborts between chunks,
/// preserving the partial file.
pub fn transfer(
    task: &SegmentTask,
    opts: &TransferOptions,
    limiter: Option<&SpeedLimiter>,
    stop: &AtomicBool,
    progress: &dyn Fn(u64, u64, f64),
) -> Result<TransferOutcome, TransferError> {
    if let Ok(meta) = std::fs::metadata(&task.destination) {
        if meta.len() > 0 {
            tracing::debug!(path = %task.destination.display(), "destination already complete");
            let size = meta.len();
            progress(size, size, 0.0);
            return Ok(TransferOutcome {
                bytes_downloaded: size,
                bytes_total: size,
            });
        }
    }
    fetch::fetch_segment(task, opts, limiter, stop, progress)
}
