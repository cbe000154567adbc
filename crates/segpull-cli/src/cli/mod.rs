//! CLI for the segpull download engine.
//!
//! `fetch` drives one asset from a `(url, path)` list file — the seam where
//! an external manifest resolver plugs in. `merge-list` and `checksum` cover
//! the hand-off side: an ordered file list for the remux tool and
//! post-assembly verification.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use segpull_core::config;
use segpull_core::task::Priority;
use std::path::PathBuf;

use commands::{run_checksum, run_fetch, run_merge_list};

/// Top-level CLI for the segpull download engine.
#[derive(Debug, Parser)]
#[command(name = "segpull")]
#[command(about = "segpull: segmented, resumable media downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Base priority for a fetched asset's segments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
    Urgent,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
            PriorityArg::Urgent => Priority::Urgent,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one asset from a segment list file (one `URL PATH` per line).
    Fetch {
        /// Path to the segment list produced by the manifest resolver.
        list: PathBuf,

        /// Directory that relative destination paths are resolved against.
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Asset identifier; defaults to the list file's stem.
        #[arg(long)]
        asset_id: Option<String>,

        /// Base priority for all segments.
        #[arg(long, value_enum, default_value = "normal")]
        priority: PriorityArg,

        /// Retries per segment after the first attempt.
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Comma-separated segment indices to escalate to urgent.
        #[arg(long, value_delimiter = ',')]
        urgent: Vec<usize>,

        /// Write the ffmpeg-concat file list here once the asset completes.
        #[arg(long)]
        remux_list: Option<PathBuf>,
    },

    /// Write an ordered ffmpeg-concat file list for downloaded segments.
    MergeList {
        /// Directory holding the segment files.
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Output file list path.
        #[arg(long, default_value = "filelist.txt")]
        out: PathBuf,

        /// Segment file extension to collect.
        #[arg(long, default_value = "ts")]
        extension: String,
    },

    /// Compute SHA-256 of a file (e.g. a remuxed asset).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                list,
                dir,
                asset_id,
                priority,
                retries,
                urgent,
                remux_list,
            } => {
                let asset_id = asset_id.unwrap_or_else(|| {
                    list.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "asset".to_string())
                });
                run_fetch(
                    &cfg,
                    &list,
                    &dir,
                    &asset_id,
                    priority.into(),
                    retries,
                    &urgent,
                    remux_list.as_deref(),
                )
                .await?;
            }
            CliCommand::MergeList {
                dir,
                out,
                extension,
            } => run_merge_list(&dir, &out, &extension)?,
            CliCommand::Checksum { path } => run_checksum(&path)?,
        }

        Ok(())
    }
}
