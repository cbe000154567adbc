//! Checksums for completed segments and assembled assets.
//!
//! Computed on demand, never inline with the transfer path. The
//! concatenated variant hashes an ordered segment list as if the files were
//! one stream, which is how an assembled asset is verified without actually
//! concatenating it.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BUF_SIZE: usize = 64 * 1024;

fn hash_file_into(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
    }
}

/// SHA-256 of one file as lowercase hex. Chunked reads keep memory bounded.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_file_into(&mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of the byte concatenation of `ordered`, as lowercase hex.
pub fn sha256_concat(ordered: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in ordered {
        hash_file_into(&mut hasher, path)?;
    }
    Ok(hex::encode(hasher.finalize()))
}
