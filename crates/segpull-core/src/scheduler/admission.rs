//! Admission loop and transfer workers.
//!
//! The admission loop pulls tasks from the priority queue while slots are
//! free and spawns one worker thread per admitted task. Workers run the
//! retry-wrapped transfer, maintain the active/completed maps, and feed the
//! perf counters and the adaptive controller. One task's failure never
//! affects siblings or the loop itself.

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::event::EngineEvent;
use crate::retry::{run_with_retry, RetryPolicy, TransferError};
use crate::task::{ActiveTransferInfo, SegmentTask};
use crate::transfer;

use super::SchedulerInner;

/// How long the loop blocks on an empty queue per iteration; doubles as the
/// idle sleep bounding CPU usage.
const DEQUEUE_WAIT: Duration = Duration::from_millis(100);

/// Sleep when all slots are busy before rechecking.
const POOL_FULL_SLEEP: Duration = Duration::from_millis(100);

pub(super) fn run_admission_loop(inner: Arc<SchedulerInner>, ack_tx: mpsc::Sender<()>) {
    loop {
        if inner.stop.load(Ordering::Relaxed) {
            break;
        }
        if let Some(adaptive) = &inner.adaptive {
            if let Some((old, new)) = adaptive.maybe_adjust() {
                inner.events.emit(EngineEvent::ConcurrencyChanged {
                    asset_id: inner.asset_id.clone(),
                    old,
                    new,
                });
            }
        }
        let limit = inner.limit.load(Ordering::Relaxed).max(1);
        let active_now = inner.shared.lock().unwrap().active.len();
        if active_now >= limit {
            std::thread::sleep(POOL_FULL_SLEEP);
            continue;
        }
        if let Some(task) = inner.queue.dequeue_timeout(DEQUEUE_WAIT) {
            admit(&inner, task);
        }
    }
    let _ = ack_tx.send(());
}

/// Move a task from pending to active and hand it to a worker thread.
fn admit(inner: &Arc<SchedulerInner>, task: SegmentTask) {
    {
        let mut shared = inner.shared.lock().unwrap();
        shared
            .active
            .insert(task.id.clone(), ActiveTransferInfo::for_task(&task));
        let active_now = shared.active.len();
        shared.counters.note_admission(active_now);
    }
    let inner = Arc::clone(inner);
    std::thread::spawn(move || run_worker(inner, task));
}

fn run_worker(inner: Arc<SchedulerInner>, task: SegmentTask) {
    inner.events.emit(EngineEvent::TransferStarted {
        asset_id: inner.asset_id.clone(),
        task_id: task.id.clone(),
        url: task.url.clone(),
    });

    let started = Instant::now();
    let policy = RetryPolicy::new(task.max_retries);
    let task_id = task.id.clone();
    let progress = |done: u64, total: u64, speed: f64| {
        let mut shared = inner.shared.lock().unwrap();
        if let Some(info) = shared.active.get_mut(&task_id) {
            info.update(done, total, speed);
        }
    };
    let mut attempts = 0u32;
    let outcome = run_with_retry(&policy, &inner.stop, |_| {
        attempts += 1;
        transfer::transfer(
            &task,
            &inner.transfer_opts,
            inner.limiter.as_deref(),
            &inner.stop,
            &progress,
        )
    });
    let elapsed = started.elapsed();

    match outcome {
        Ok(out) => finish(
            &inner,
            task,
            true,
            out.bytes_downloaded,
            out.bytes_total,
            None,
            elapsed,
        ),
        Err(TransferError::Aborted) => {
            // Stop requested mid-flight: drop the task without a result;
            // the partial temp file stays for a future resume.
            inner.shared.lock().unwrap().active.remove(&task_id);
        }
        Err(e) => {
            let partial = std::fs::metadata(transfer::temp_path(&task.destination))
                .map(|m| m.len())
                .unwrap_or(0);
            if let TransferError::Unknown(_) = &e {
                tracing::error!(
                    url = %task.url,
                    path = %task.destination.display(),
                    attempts,
                    bytes_so_far = partial,
                    "segment failed with unclassified error: {}",
                    e
                );
            }
            finish(&inner, task, false, partial, 0, Some(e.to_string()), elapsed);
        }
    }
}

/// Record the terminal state: active → completed, counters, adaptive sample.
fn finish(
    inner: &Arc<SchedulerInner>,
    task: SegmentTask,
    success: bool,
    bytes_downloaded: u64,
    bytes_total: u64,
    error: Option<String>,
    elapsed: Duration,
) {
    let task_id = task.id.clone();
    let result = crate::task::TransferResult {
        task,
        success,
        bytes_downloaded,
        bytes_total,
        error: error.clone(),
        elapsed,
    };
    {
        let mut shared = inner.shared.lock().unwrap();
        shared.active.remove(&task_id);
        shared.counters.record_completion(success, elapsed, bytes_downloaded);
        shared.completed.insert(task_id.clone(), result);
    }
    if let Some(adaptive) = &inner.adaptive {
        let secs = elapsed.as_secs_f64();
        let speed = if secs > 0.0 {
            bytes_downloaded as f64 / secs
        } else {
            0.0
        };
        adaptive.record(success, speed, secs);
    }
    let event = if success {
        EngineEvent::TransferCompleted {
            asset_id: inner.asset_id.clone(),
            task_id,
            bytes: bytes_downloaded,
            elapsed,
        }
    } else {
        EngineEvent::TransferFailed {
            asset_id: inner.asset_id.clone(),
            task_id,
            error: error.unwrap_or_else(|| "unknown".into()),
        }
    };
    inner.events.emit(event);
}
