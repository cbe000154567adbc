//! Hand-off to the external remux/concatenation step.
//!
//! The engine's output contract is an ordered list of completed segment
//! files. This module writes that list in ffmpeg concat-demuxer format
//! (`file '<path>'` per line); running the remux tool itself is out of
//! scope.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Paths from `ordered` that do not exist (or are empty) on disk.
pub fn missing(ordered: &[PathBuf]) -> Vec<PathBuf> {
    ordered
        .iter()
        .filter(|p| fs::metadata(p).map(|m| m.len() == 0).unwrap_or(true))
        .cloned()
        .collect()
}

/// Write the concat-demuxer file list for `ordered` to `out`.
///
/// Single quotes inside paths are escaped the way ffmpeg expects
/// (`'` → `'\''`).
pub fn write_file_list(ordered: &[PathBuf], out: &Path) -> Result<()> {
    let mut f = fs::File::create(out)
        .with_context(|| format!("create file list {}", out.display()))?;
    for path in ordered {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        writeln!(f, "file '{}'", escaped)
            .with_context(|| format!("write file list {}", out.display()))?;
    }
    Ok(())
}
