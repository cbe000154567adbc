//! Structured engine events.
//!
//! The scheduler and batch coordinator report progress by emitting events
//! into an injected sink, keeping transfer logic decoupled from whatever
//! presentation layer is listening. `TracingSink` forwards everything to
//! `tracing`; `NullSink` discards.

use std::sync::Arc;
use std::time::Duration;

/// One notable engine occurrence.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    AssetSubmitted {
        asset_id: String,
        segments: usize,
    },
    TransferStarted {
        asset_id: String,
        task_id: String,
        url: String,
    },
    TransferCompleted {
        asset_id: String,
        task_id: String,
        bytes: u64,
        elapsed: Duration,
    },
    TransferFailed {
        asset_id: String,
        task_id: String,
        error: String,
    },
    ConcurrencyChanged {
        asset_id: String,
        old: usize,
        new: usize,
    },
    /// Advisory telemetry from the per-asset monitor.
    MonitorTick {
        asset_id: String,
        completed: usize,
        total: usize,
        active: usize,
        eta_secs: Option<f64>,
    },
    AssetCompleted {
        asset_id: String,
        successful: usize,
        failed: usize,
    },
}

/// Capability to receive engine events. Implementations must be cheap and
/// non-blocking; emission happens on worker and monitor threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards all events.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Forwards events to `tracing` at sensible levels.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::AssetSubmitted { asset_id, segments } => {
                tracing::info!(%asset_id, segments, "asset submitted");
            }
            EngineEvent::TransferStarted {
                asset_id,
                task_id,
                url,
            } => {
                tracing::debug!(%asset_id, %task_id, %url, "transfer started");
            }
            EngineEvent::TransferCompleted {
                asset_id,
                task_id,
                bytes,
                elapsed,
            } => {
                tracing::debug!(
                    %asset_id,
                    %task_id,
                    bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "transfer completed"
                );
            }
            EngineEvent::TransferFailed {
                asset_id,
                task_id,
                error,
            } => {
                tracing::warn!(%asset_id, %task_id, %error, "transfer failed");
            }
            EngineEvent::ConcurrencyChanged { asset_id, old, new } => {
                tracing::info!(%asset_id, old, new, "concurrency limit changed");
            }
            EngineEvent::MonitorTick {
                asset_id,
                completed,
                total,
                active,
                eta_secs,
            } => {
                tracing::debug!(%asset_id, completed, total, active, eta_secs, "monitor tick");
            }
            EngineEvent::AssetCompleted {
                asset_id,
                successful,
                failed,
            } => {
                tracing::info!(%asset_id, successful, failed, "asset completed");
            }
        }
    }
}

/// Shared sink handle used throughout the engine.
pub type SharedSink = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects events for assertions in tests.
    pub struct RecordingSink(pub Mutex<Vec<EngineEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: EngineEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn recording_sink_collects_in_order() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        sink.emit(EngineEvent::AssetSubmitted {
            asset_id: "a".into(),
            segments: 3,
        });
        sink.emit(EngineEvent::AssetCompleted {
            asset_id: "a".into(),
            successful: 3,
            failed: 0,
        });
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EngineEvent::AssetSubmitted { .. }));
        assert!(matches!(events[1], EngineEvent::AssetCompleted { .. }));
    }
}
