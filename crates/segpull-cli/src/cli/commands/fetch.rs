//! `segpull fetch` – download one asset from a segment list file.

use anyhow::{Context, Result};
use segpull_core::batch::BatchCoordinator;
use segpull_core::config::EngineConfig;
use segpull_core::event::TracingSink;
use segpull_core::task::Priority;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Parse a segment list: one `URL PATH` pair per line, whitespace-separated;
/// blank lines and `#` comments are skipped. Relative paths resolve against
/// `dir`.
fn parse_segment_list(list: &Path, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let data = std::fs::read_to_string(list)
        .with_context(|| format!("read segment list {}", list.display()))?;
    let mut segments = Vec::new();
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(url), Some(path)) = (parts.next(), parts.next()) else {
            anyhow::bail!("{}:{}: expected `URL PATH`", list.display(), lineno + 1);
        };
        let path = PathBuf::from(path);
        let path = if path.is_absolute() {
            path
        } else {
            dir.join(path)
        };
        segments.push((url.to_string(), path));
    }
    Ok(segments)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_fetch(
    cfg: &EngineConfig,
    list: &Path,
    dir: &Path,
    asset_id: &str,
    priority: Priority,
    retries: u32,
    urgent: &[usize],
    remux_list: Option<&Path>,
) -> Result<()> {
    let segments = parse_segment_list(list, dir)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create download dir {}", dir.display()))?;

    let coordinator = Arc::new(BatchCoordinator::new(cfg.clone(), Arc::new(TracingSink)));
    let (feed_tx, mut feed_rx) = tokio::sync::mpsc::channel(16);
    coordinator.set_monitor_feed(feed_tx);

    let count = coordinator.submit_asset(asset_id, segments, priority, retries, urgent)?;
    println!("fetching {} segment(s) for asset {}", count, asset_id);

    let feed_printer = tokio::spawn(async move {
        while let Some(report) = feed_rx.recv().await {
            let eta = report
                .eta_secs
                .map(|s| format!("{:.0}s", s))
                .unwrap_or_else(|| "?".to_string());
            println!(
                "  {}/{} done ({:.1}%)  active {}  queued {}  ETA {}",
                report.completed,
                report.total,
                report.percentage,
                report.active,
                report.queued,
                eta
            );
        }
    });

    while !coordinator.asset_complete(asset_id) {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    coordinator.stop_all();
    feed_printer.abort();

    let stats = coordinator.global_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if stats.failed_tasks > 0 {
        tracing::warn!(
            failed = stats.failed_tasks,
            "asset finished with permanently failed segments"
        );
        println!(
            "warning: {} segment(s) failed permanently; asset is incomplete",
            stats.failed_tasks
        );
        return Ok(());
    }

    if let Some(out) = remux_list {
        coordinator.write_remux_list(asset_id, out)?;
        println!("remux file list written to {}", out.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_list_parses_pairs_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("ep1.txt");
        std::fs::write(
            &list,
            "# episode 1\nhttp://cdn/seg0.ts seg_0000.ts\n\nhttp://cdn/seg1.ts /abs/seg_0001.ts\n",
        )
        .unwrap();
        let segments = parse_segment_list(&list, Path::new("/media/ep1")).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0, "http://cdn/seg0.ts");
        assert_eq!(segments[0].1, Path::new("/media/ep1/seg_0000.ts"));
        assert_eq!(segments[1].1, Path::new("/abs/seg_0001.ts"));
    }

    #[test]
    fn segment_list_rejects_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("bad.txt");
        std::fs::write(&list, "http://cdn/only-a-url.ts\n").unwrap();
        assert!(parse_segment_list(&list, Path::new(".")).is_err());
    }
}
