//! Execution of one claimed job, from command line to finished file.

mod args;
mod postprocess;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::naming::{find_output_file, new_file_id};
use crate::process::{self, ProcessError};
use crate::queue::{Claim, MediaKind, Phase, Progress};

use super::pool::WorkerContext;
use super::progress::ProgressThrottle;

pub use args::download_args;
pub use postprocess::reencode_audio_aac;

/// Why an attempt failed. Every variant consumes one attempt.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("download finished but produced no output file for {file_id}")]
    OutputMissing { file_id: String },
    #[error("output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Run the downloader for `claim` and return the produced file name.
///
/// Progress is throttled into the queue while the process runs and the
/// claim is kept alive by heartbeats for the whole attempt, post-processing
/// and the final progress write included.
pub async fn execute_job(ctx: &WorkerContext, claim: &Claim) -> Result<String, JobError> {
    with_heartbeat(ctx, claim, run_attempt(ctx, claim)).await
}

/// Drive `attempt` to completion, extending the claim on every tick.
async fn with_heartbeat<F>(ctx: &WorkerContext, claim: &Claim, attempt: F) -> F::Output
where
    F: Future,
{
    let mut attempt = std::pin::pin!(attempt);
    let mut ticker = tokio::time::interval(ctx.heartbeat_interval());
    ticker.tick().await;
    loop {
        tokio::select! {
            out = &mut attempt => return out,
            _ = ticker.tick() => {
                match ctx.queue.heartbeat(claim).await {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(job = claim.id(), "claim no longer current"),
                    Err(e) => tracing::warn!(job = claim.id(), "heartbeat failed: {:#}", e),
                }
            }
        }
    }
}

async fn run_attempt(ctx: &WorkerContext, claim: &Claim) -> Result<String, JobError> {
    let dir = &ctx.download_dir;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| JobError::OutputDir {
            path: dir.clone(),
            source,
        })?;

    let file_id = new_file_id();
    let template = dir.join(format!("{file_id}.%(ext)s"));
    let args = download_args(&claim.job.params, &template, &ctx.binaries.js_runtime);
    tracing::info!(
        job = claim.id(),
        attempt = claim.attempt,
        kind = %claim.job.params.kind,
        quality = %claim.job.params.quality,
        file_id = %file_id,
        "starting download"
    );

    let (tx, rx) = mpsc::channel(64);
    let runner = process::run(&ctx.binaries.ytdlp, &args, Some(tx));
    let publisher = publish_progress(ctx, claim, rx);
    let (outcome, ()) = tokio::join!(runner, publisher);
    outcome?;

    let name = find_output_file(dir, &file_id)
        .await
        .map_err(|source| JobError::OutputDir {
            path: dir.clone(),
            source,
        })?
        .ok_or_else(|| JobError::OutputMissing {
            file_id: file_id.clone(),
        })?;

    if claim.job.params.kind == MediaKind::Video && name.ends_with(".mp4") {
        report(ctx, claim, Progress::new(100.0, Phase::Processing)).await;
        let path = dir.join(&name);
        if let Err(e) = reencode_audio_aac(&ctx.binaries.ffmpeg, &path).await {
            tracing::warn!(job = claim.id(), file = %name, "aac post-processing skipped: {:#}", e);
        }
    }

    report(ctx, claim, Progress::new(100.0, Phase::Done)).await;
    tracing::info!(job = claim.id(), file = %name, "download finished");
    Ok(name)
}

/// Drain parsed progress, writing at most one snapshot per interval.
async fn publish_progress(ctx: &WorkerContext, claim: &Claim, mut rx: mpsc::Receiver<Progress>) {
    let mut throttle = ProgressThrottle::new(ctx.progress_interval);
    while let Some(progress) = rx.recv().await {
        if throttle.should_forward(&progress, Instant::now()) {
            report(ctx, claim, progress).await;
        }
    }
}

async fn report(ctx: &WorkerContext, claim: &Claim, progress: Progress) {
    if let Err(e) = ctx.queue.report_progress(claim, &progress).await {
        tracing::debug!(job = claim.id(), "progress write failed: {:#}", e);
    }
}
