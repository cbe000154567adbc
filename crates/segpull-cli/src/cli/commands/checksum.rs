//! `segpull checksum` – SHA-256 of a file, e.g. after remuxing.

use anyhow::Result;
use segpull_core::checksum;
use std::path::Path;

pub fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
