//! Per-asset background monitor.
//!
//! Periodically derives completion rate and estimated time remaining from
//! the scheduler's telemetry, emits advisory events, and feeds an optional
//! channel for async consumers. Advisory only; it never changes engine
//! state itself.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::event::{EngineEvent, SharedSink};

use super::AssetHandle;

/// One monitor observation, suitable for polling UIs.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub asset_id: String,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub queued: usize,
    pub percentage: f64,
    /// Terminal segments per second since monitoring started.
    pub segments_per_sec: f64,
    pub eta_secs: Option<f64>,
    /// Advisory concurrency suggestion; callers may apply it or ignore it.
    pub proposed_concurrency: Option<usize>,
}

const STOP_POLL: Duration = Duration::from_millis(100);

pub(super) fn run_monitor(
    handle: Arc<AssetHandle>,
    asset_id: String,
    interval: Duration,
    max_workers: usize,
    events: SharedSink,
    feed: Option<tokio::sync::mpsc::Sender<MonitorReport>>,
) {
    let monitor_start = Instant::now();
    loop {
        // Sleep in slices so stop requests are observed promptly.
        let mut remaining = interval;
        while !remaining.is_zero() {
            if handle.monitor_stop.load(Ordering::Relaxed) {
                return;
            }
            let step = remaining.min(STOP_POLL);
            std::thread::sleep(step);
            remaining -= step;
        }
        if handle.monitor_stop.load(Ordering::Relaxed) {
            return;
        }

        let total = handle.total_segments.load(Ordering::Relaxed);
        let summary = handle.scheduler.completed_summary();
        let status = handle.scheduler.queue_status();
        let elapsed = monitor_start.elapsed().as_secs_f64();
        let segments_per_sec = if elapsed > 0.0 {
            summary.completed as f64 / elapsed
        } else {
            0.0
        };
        let remaining_segments = total.saturating_sub(summary.completed);
        let eta_secs = (segments_per_sec > 0.0 && remaining_segments > 0)
            .then(|| remaining_segments as f64 / segments_per_sec);

        let report = MonitorReport {
            asset_id: asset_id.clone(),
            total,
            completed: summary.successful,
            active: status.active,
            queued: status.queued,
            percentage: if total > 0 {
                summary.successful as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            segments_per_sec,
            eta_secs,
            proposed_concurrency: propose_concurrency(
                segments_per_sec,
                status.active,
                status.concurrency_limit,
                max_workers,
            ),
        };
        events.emit(EngineEvent::MonitorTick {
            asset_id: asset_id.clone(),
            completed: report.completed,
            total,
            active: report.active,
            eta_secs: report.eta_secs,
        });
        if let Some(feed) = &feed {
            let _ = feed.try_send(report);
        }

        if total > 0 && summary.completed >= total && status.active == 0 && status.queued == 0 {
            events.emit(EngineEvent::AssetCompleted {
                asset_id: asset_id.clone(),
                successful: summary.successful,
                failed: summary.failed,
            });
            return;
        }
    }
}

/// Advisory concurrency suggestion from the observed completion rate: slow
/// progress with headroom suggests more workers, very fast progress can
/// shed a worker to ease server pressure.
fn propose_concurrency(
    segments_per_sec: f64,
    active: usize,
    current_limit: usize,
    max_workers: usize,
) -> Option<usize> {
    if segments_per_sec < 1.0 && active >= current_limit && current_limit < max_workers {
        return Some((current_limit + 2).min(max_workers));
    }
    if segments_per_sec > 5.0 && current_limit > 3 {
        return Some(current_limit - 1);
    }
    None
}
