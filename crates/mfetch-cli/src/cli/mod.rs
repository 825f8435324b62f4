//! CLI for the mfetch media download queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mfetch_core::config;
use mfetch_core::queue::JobQueue;
use mfetch_core::service::MediaService;
use std::path::PathBuf;

use commands::{run_fetch, run_list, run_status, run_submit, run_sweep, run_workers};

/// Top-level CLI for mfetch.
#[derive(Debug, Parser)]
#[command(name = "mfetch")]
#[command(about = "mfetch: queued media downloads through yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a media URL for download.
    Submit {
        /// Page or media URL understood by yt-dlp.
        url: String,
        /// What to fetch: video, audio, mp3 or thumb (default video).
        #[arg(long)]
        kind: Option<String>,
        /// Maximum video height such as 720, or "best" (default).
        #[arg(long)]
        quality: Option<String>,
    },

    /// Print the status of one job as JSON.
    Status {
        /// Job identifier.
        id: i64,
    },

    /// List all jobs, newest first.
    List,

    /// Run the worker pool and the retention sweeper until Ctrl-C.
    Run {
        /// Number of concurrent workers (overrides the config value).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Delete expired files from the output directory once and exit.
    Sweep,

    /// Copy a finished file out of the output directory.
    Fetch {
        /// File name as reported by `status`.
        name: String,
        /// Destination file or directory (default: current directory).
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_with_env()?;
        tracing::debug!("loaded config: {:?}", cfg);

        // Sweeping only needs the output directory.
        if let CliCommand::Sweep = cli.command {
            return run_sweep(&cfg).await;
        }

        let queue = JobQueue::open_from_config(&cfg).await?;
        let service = MediaService::new(queue.clone(), cfg.download_dir.clone());

        let result = match cli.command {
            CliCommand::Submit { url, kind, quality } => {
                run_submit(&service, &url, kind.as_deref(), quality.as_deref()).await
            }
            CliCommand::Status { id } => run_status(&service, id).await,
            CliCommand::List => run_list(&queue).await,
            CliCommand::Run { jobs } => run_workers(&queue, &cfg, jobs).await,
            CliCommand::Fetch { name, dest } => run_fetch(&service, &name, dest.as_deref()).await,
            CliCommand::Sweep => Ok(()),
        };

        queue.close().await;
        result
    }
}

#[cfg(test)]
mod tests;
