//! `segpull merge-list` – write the ordered file list for the remux tool.

use anyhow::{bail, Context, Result};
use segpull_core::assemble;
use std::path::{Path, PathBuf};

/// Collect `*.{extension}` files in `dir`, ordered by filename with numeric
/// awareness (`seg_2.ts` before `seg_10.ts`).
fn collect_segments(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file() && p.extension().map(|e| e.eq_ignore_ascii_case(extension)) == Some(true)
        })
        .collect();
    files.sort_by_key(|p| sort_key(p));
    Ok(files)
}

/// Filename split into text and numeric runs so embedded indices sort
/// numerically.
fn sort_key(path: &Path) -> Vec<(String, u64)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut key = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();
    for c in name.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if !digits.is_empty() {
                key.push((text.clone(), digits.parse().unwrap_or(0)));
                text.clear();
                digits.clear();
            }
            text.push(c);
        }
    }
    key.push((text, digits.parse().unwrap_or(0)));
    key
}

pub fn run_merge_list(dir: &Path, out: &Path, extension: &str) -> Result<()> {
    let segments = collect_segments(dir, extension)?;
    if segments.is_empty() {
        bail!(
            "no .{} segment files found in {}",
            extension,
            dir.display()
        );
    }
    let missing = assemble::missing(&segments);
    if !missing.is_empty() {
        bail!(
            "{} segment file(s) are empty; refusing to write an incomplete list",
            missing.len()
        );
    }
    assemble::write_file_list(&segments, out)?;
    println!(
        "wrote {} entries to {} (feed to: ffmpeg -f concat -safe 0 -i {} -c copy output.mp4)",
        segments.len(),
        out.display(),
        out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_sort_numerically_not_lexically() {
        let dir = tempfile::tempdir().unwrap();
        for i in [0usize, 2, 10, 1] {
            std::fs::write(dir.path().join(format!("seg_{i}.ts")), b"x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        let files = collect_segments(dir.path(), "ts").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["seg_0.ts", "seg_1.ts", "seg_2.ts", "seg_10.ts"]);
    }

    #[test]
    fn merge_list_refuses_empty_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seg_0.ts"), b"").unwrap();
        let out = dir.path().join("list.txt");
        assert!(run_merge_list(dir.path(), &out, "ts").is_err());
    }
}
