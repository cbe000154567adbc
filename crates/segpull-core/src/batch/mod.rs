//! Batch coordinator: one scheduler per logical asset.
//!
//! Receives an asset's ordered `(url, destination)` list, assigns
//! per-segment priorities, enqueues in decorrelated order, and tracks
//! progress across all assets. Constructed once and passed to whoever needs
//! it; there is no process-wide instance.

mod monitor;
mod priority;

pub use monitor::MonitorReport;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::Serialize;

use crate::adaptive::AdaptiveConcurrency;
use crate::assemble;
use crate::config::EngineConfig;
use crate::event::{EngineEvent, SharedSink};
use crate::scheduler::{PerformanceStats, QueueStatus, Scheduler, SchedulerOptions};
use crate::task::{ActiveTransferInfo, Priority, SegmentTask, TransferResult};
use crate::transfer::{SpeedLimiter, TransferOptions};

/// Progress rollup for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct AssetProgress {
    pub total: usize,
    pub completed: usize,
    pub bytes_total: u64,
    pub bytes_downloaded: u64,
    pub percentage: f64,
    pub active: usize,
    pub queued: usize,
}

/// Statistics aggregated across all assets.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub runtime_secs: f64,
    pub active_assets: usize,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// Fraction in [0, 1].
    pub success_rate: f64,
    pub total_bytes: u64,
    pub average_speed_bytes_per_sec: f64,
    pub peak_concurrent: usize,
}

/// Everything the coordinator keeps per asset.
pub(crate) struct AssetHandle {
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) adaptive: Arc<AdaptiveConcurrency>,
    pub(crate) total_segments: AtomicUsize,
    /// Destinations in original manifest order, for the remux hand-off.
    pub(crate) ordered_paths: Mutex<Vec<PathBuf>>,
    pub(crate) monitor_stop: AtomicBool,
    monitor_running: AtomicBool,
}

/// One coordinator owns all assets of a process. Explicitly constructed and
/// injected; dropping it does not interrupt running transfers (call
/// [`BatchCoordinator::stop_all`] for that).
pub struct BatchCoordinator {
    config: EngineConfig,
    events: SharedSink,
    assets: Mutex<HashMap<String, Arc<AssetHandle>>>,
    monitor_feed: Mutex<Option<tokio::sync::mpsc::Sender<MonitorReport>>>,
    limiter: Option<Arc<SpeedLimiter>>,
    started_at: Instant,
}

impl BatchCoordinator {
    pub fn new(config: EngineConfig, events: SharedSink) -> Self {
        let limiter = config.max_bytes_per_sec.map(|cap| Arc::new(SpeedLimiter::new(cap)));
        Self {
            config,
            events,
            assets: Mutex::new(HashMap::new()),
            monitor_feed: Mutex::new(None),
            limiter,
            started_at: Instant::now(),
        }
    }

    /// Attach a channel that receives every asset's monitor reports.
    pub fn set_monitor_feed(&self, feed: tokio::sync::mpsc::Sender<MonitorReport>) {
        *self.monitor_feed.lock().unwrap() = Some(feed);
    }

    fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            connect_timeout: Duration::from_secs(self.config.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.config.read_timeout_secs),
            large_object_threshold: self.config.large_object_threshold,
            ..TransferOptions::default()
        }
    }

    fn handle_for(&self, asset_id: &str) -> Arc<AssetHandle> {
        let mut assets = self.assets.lock().unwrap();
        Arc::clone(assets.entry(asset_id.to_string()).or_insert_with(|| {
            let adaptive = Arc::new(AdaptiveConcurrency::new(
                self.config.min_workers,
                self.config.max_workers,
                self.config.max_concurrent_per_asset,
                Duration::from_secs(self.config.adjust_interval_secs),
            ));
            let scheduler = Scheduler::new(SchedulerOptions {
                asset_id: asset_id.to_string(),
                concurrency: self.config.max_concurrent_per_asset,
                transfer: self.transfer_options(),
                limiter: self.limiter.clone(),
                events: Arc::clone(&self.events),
                adaptive: Some(Arc::clone(&adaptive)),
            });
            Arc::new(AssetHandle {
                scheduler: Arc::new(scheduler),
                adaptive,
                total_segments: AtomicUsize::new(0),
                ordered_paths: Mutex::new(Vec::new()),
                monitor_stop: AtomicBool::new(false),
                monitor_running: AtomicBool::new(false),
            })
        }))
    }

    /// Submit one asset's ordered segment list. Repeat submissions to the
    /// same asset id append to its scheduler. Returns the number of tasks
    /// enqueued.
    pub fn submit_asset(
        &self,
        asset_id: &str,
        segments: Vec<(String, PathBuf)>,
        base_priority: Priority,
        retry_count: u32,
        urgent_indices: &[usize],
    ) -> Result<usize> {
        if segments.is_empty() {
            bail!("asset {asset_id}: empty segment list");
        }
        let handle = self.handle_for(asset_id);
        let offset = handle
            .total_segments
            .fetch_add(segments.len(), Ordering::Relaxed);
        {
            let mut ordered = handle.ordered_paths.lock().unwrap();
            ordered.extend(segments.iter().map(|(_, p)| p.clone()));
        }

        let total = segments.len();
        let order = priority::shuffled_indices(total, asset_id);
        let mut added = 0usize;
        for index in order {
            let (url, path) = &segments[index];
            let urgent = urgent_indices.contains(&index);
            let assigned = if urgent {
                Priority::Urgent
            } else {
                priority::segment_priority(base_priority, index, total, path)
            };
            let mut task = SegmentTask::new(
                format!("{}_segment_{}", asset_id, offset + index),
                url.clone(),
                path.clone(),
            );
            task.priority = assigned;
            task.max_retries = retry_count;
            task.chunk_size = self.config.chunk_size;
            if urgent {
                handle.scheduler.enqueue_urgent(task);
            } else {
                handle.scheduler.enqueue(task);
            }
            added += 1;
        }

        handle.scheduler.start();
        self.spawn_monitor(&handle, asset_id);
        self.events.emit(EngineEvent::AssetSubmitted {
            asset_id: asset_id.to_string(),
            segments: added,
        });
        Ok(added)
    }

    fn spawn_monitor(&self, handle: &Arc<AssetHandle>, asset_id: &str) {
        if handle.monitor_running.swap(true, Ordering::Relaxed) {
            return;
        }
        let handle = Arc::clone(handle);
        let asset_id = asset_id.to_string();
        let interval = Duration::from_secs(self.config.monitor_interval_secs);
        let max_workers = self.config.max_workers;
        let events = Arc::clone(&self.events);
        let feed = self.monitor_feed.lock().unwrap().clone();
        std::thread::spawn(move || {
            monitor::run_monitor(handle, asset_id, interval, max_workers, events, feed)
        });
    }

    /// Progress rollup for one asset; `None` for unknown asset ids.
    pub fn progress(&self, asset_id: &str) -> Option<AssetProgress> {
        let handle = self.asset(asset_id)?;
        let summary = handle.scheduler.completed_summary();
        let status = handle.scheduler.queue_status();
        let mut total = handle.total_segments.load(Ordering::Relaxed);
        if total == 0 && summary.completed == 0 {
            // No recorded outcomes yet: approximate from live queue state.
            total = status.queued + status.active;
        }
        let completed = summary.successful;
        Some(AssetProgress {
            total,
            completed,
            bytes_total: summary.bytes_total,
            bytes_downloaded: summary.bytes_downloaded,
            percentage: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            active: status.active,
            queued: status.queued,
        })
    }

    /// All segments of the asset have a terminal result and nothing is
    /// queued or running.
    pub fn asset_complete(&self, asset_id: &str) -> bool {
        let Some(handle) = self.asset(asset_id) else {
            return false;
        };
        let total = handle.total_segments.load(Ordering::Relaxed);
        let summary = handle.scheduler.completed_summary();
        total > 0 && summary.completed >= total && handle.scheduler.is_idle()
    }

    pub fn queue_status(&self, asset_id: &str) -> Option<QueueStatus> {
        Some(self.asset(asset_id)?.scheduler.queue_status())
    }

    pub fn active_downloads_info(&self, asset_id: &str) -> Vec<ActiveTransferInfo> {
        self.asset(asset_id)
            .map(|h| h.scheduler.active_downloads_info())
            .unwrap_or_default()
    }

    pub fn performance_stats(&self, asset_id: &str) -> Option<PerformanceStats> {
        Some(self.asset(asset_id)?.scheduler.performance_stats())
    }

    pub fn result(&self, asset_id: &str, task_id: &str) -> Option<TransferResult> {
        self.asset(asset_id)?.scheduler.result(task_id)
    }

    /// Rolling average transfer speed (bytes/sec) from the asset's adaptive
    /// controller window.
    pub fn recent_average_speed(&self, asset_id: &str) -> Option<f64> {
        Some(self.asset(asset_id)?.adaptive.recent_average_speed())
    }

    pub fn asset_ids(&self) -> Vec<String> {
        self.assets.lock().unwrap().keys().cloned().collect()
    }

    /// Write the ordered file list consumed by the external remux tool.
    pub fn write_remux_list(&self, asset_id: &str, out: &Path) -> Result<()> {
        let Some(handle) = self.asset(asset_id) else {
            bail!("unknown asset: {asset_id}");
        };
        let ordered = handle.ordered_paths.lock().unwrap().clone();
        let missing = assemble::missing(&ordered);
        if !missing.is_empty() {
            bail!(
                "asset {} has {} missing segment file(s); first: {}",
                asset_id,
                missing.len(),
                missing[0].display()
            );
        }
        assemble::write_file_list(&ordered, out)
    }

    /// Stop one asset: no new admissions, monitor ends, results are kept.
    pub fn stop_asset(&self, asset_id: &str) {
        if let Some(handle) = self.asset(asset_id) {
            handle.monitor_stop.store(true, Ordering::Relaxed);
            handle.scheduler.stop();
        }
    }

    /// Stop every asset's scheduler and monitor. Recorded results survive.
    pub fn stop_all(&self) {
        let handles: Vec<Arc<AssetHandle>> =
            self.assets.lock().unwrap().values().cloned().collect();
        for handle in handles {
            handle.monitor_stop.store(true, Ordering::Relaxed);
            handle.scheduler.stop();
        }
    }

    /// Aggregate statistics across all assets.
    pub fn global_stats(&self) -> GlobalStats {
        let handles: Vec<Arc<AssetHandle>> =
            self.assets.lock().unwrap().values().cloned().collect();
        let mut total_tasks = 0u64;
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut total_bytes = 0u64;
        let mut total_elapsed_secs = 0.0f64;
        let mut peak_concurrent = 0usize;
        for handle in &handles {
            let stats = handle.scheduler.performance_stats();
            total_tasks += stats.total_tasks;
            successful += stats.successful_tasks;
            failed += stats.failed_tasks;
            total_bytes += stats.total_bytes;
            total_elapsed_secs += stats.average_elapsed_secs * stats.total_tasks as f64;
            peak_concurrent = peak_concurrent.max(stats.peak_concurrent);
        }
        GlobalStats {
            runtime_secs: self.started_at.elapsed().as_secs_f64(),
            active_assets: handles.len(),
            total_tasks,
            successful_tasks: successful,
            failed_tasks: failed,
            success_rate: if total_tasks > 0 {
                successful as f64 / total_tasks as f64
            } else {
                0.0
            },
            total_bytes,
            average_speed_bytes_per_sec: if total_elapsed_secs > 0.0 {
                total_bytes as f64 / total_elapsed_secs
            } else {
                0.0
            },
            peak_concurrent,
        }
    }

    fn asset(&self, asset_id: &str) -> Option<Arc<AssetHandle>> {
        self.assets.lock().unwrap().get(asset_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(EngineConfig::default(), Arc::new(NullSink))
    }

    #[test]
    fn empty_submission_is_rejected() {
        let c = coordinator();
        assert!(c
            .submit_asset("a", Vec::new(), Priority::Normal, 1, &[])
            .is_err());
    }

    #[test]
    fn progress_unknown_asset_is_none() {
        let c = coordinator();
        assert!(c.progress("nope").is_none());
        assert!(!c.asset_complete("nope"));
    }

    #[test]
    fn submit_registers_asset_and_counts_tasks() {
        let c = coordinator();
        let dir = tempfile::tempdir().unwrap();
        let segments: Vec<(String, PathBuf)> = (0..5)
            .map(|i| {
                (
                    // Unroutable test address; nothing will be fetched before stop.
                    format!("http://192.0.2.1/seg_{i}.ts"),
                    dir.path().join(format!("seg_{i}.ts")),
                )
            })
            .collect();
        let added = c
            .submit_asset("ep1", segments, Priority::Normal, 0, &[])
            .unwrap();
        assert_eq!(added, 5);
        assert_eq!(c.asset_ids(), vec!["ep1".to_string()]);
        let progress = c.progress("ep1").unwrap();
        assert_eq!(progress.total, 5);
        c.stop_all();
    }

    #[test]
    fn global_stats_empty_engine() {
        let c = coordinator();
        let stats = c.global_stats();
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.active_assets, 0);
    }
}
