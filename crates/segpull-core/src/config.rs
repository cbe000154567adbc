use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Global configuration loaded from `~/.config/segpull/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Starting concurrent transfers per asset.
    pub max_concurrent_per_asset: usize,
    /// Lower bound for the adaptive concurrency controller.
    pub min_workers: usize,
    /// Upper bound for the adaptive concurrency controller.
    pub max_workers: usize,
    /// Seconds between adaptive concurrency adjustments.
    pub adjust_interval_secs: u64,
    /// Seconds between per-asset monitor reports.
    pub monitor_interval_secs: u64,
    /// Streaming chunk size in bytes.
    pub chunk_size: usize,
    /// Bytes above which large-object tasks switch to batched writes.
    pub large_object_threshold: u64,
    /// Connect timeout per request, seconds.
    pub connect_timeout_secs: u64,
    /// Read-stall timeout per request, seconds.
    pub read_timeout_secs: u64,
    /// Optional retry policy; built-in defaults when missing.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional bandwidth cap in bytes per second (None = no cap).
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_asset: 10,
            min_workers: 2,
            max_workers: 20,
            adjust_interval_secs: 30,
            monitor_interval_secs: 10,
            chunk_size: 64 * 1024,
            large_object_threshold: 10 * 1024 * 1024,
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            retry: None,
            max_bytes_per_sec: None,
        }
    }
}

impl EngineConfig {
    /// Effective retry count, config section or built-in default.
    pub fn max_retries(&self) -> u32 {
        self.retry
            .as_ref()
            .map(|r| r.max_retries)
            .unwrap_or_else(|| RetryConfig::default().max_retries)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segpull")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: EngineConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_concurrent_per_asset, 10);
        assert_eq!(cfg.min_workers, 2);
        assert_eq!(cfg.max_workers, 20);
        assert_eq!(cfg.large_object_threshold, 10 * 1024 * 1024);
        assert_eq!(cfg.max_retries(), 3);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent_per_asset, cfg.max_concurrent_per_asset);
        assert_eq!(parsed.max_workers, cfg.max_workers);
        assert_eq!(parsed.chunk_size, cfg.chunk_size);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_per_asset = 4
            min_workers = 1
            max_workers = 8
            adjust_interval_secs = 15
            monitor_interval_secs = 5
            chunk_size = 32768
            large_object_threshold = 1048576
            connect_timeout_secs = 10
            read_timeout_secs = 20
            max_bytes_per_sec = 500000

            [retry]
            max_retries = 5
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_per_asset, 4);
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.max_bytes_per_sec, Some(500_000));
        assert_eq!(cfg.max_retries(), 5);
    }

    #[test]
    fn retry_section_optional() {
        let toml = r#"
            max_concurrent_per_asset = 4
            min_workers = 1
            max_workers = 8
            adjust_interval_secs = 30
            monitor_interval_secs = 10
            chunk_size = 65536
            large_object_threshold = 10485760
            connect_timeout_secs = 30
            read_timeout_secs = 30
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.max_retries(), 3);
    }
}
