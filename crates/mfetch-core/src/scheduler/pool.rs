//! Fixed pool of workers draining the job queue.
//!
//! Each worker is a sequential loop: claim a job, run it to an outcome,
//! report the outcome, repeat. A separate loop returns jobs whose claim
//! expired (worker gone without reporting) to the queue.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::config::{BinariesConfig, MfetchConfig};
use crate::queue::{Claim, FailOutcome, JobQueue};
use crate::shutdown;

use super::execute::{execute_job, JobError};

/// Pause after the queue failed to hand out a job.
const DEQUEUE_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Stored when a failure carries no text at all.
const GENERIC_FAILURE: &str = "download failed without diagnostic output";

/// Everything a worker needs to execute jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: JobQueue,
    pub download_dir: PathBuf,
    pub binaries: BinariesConfig,
    pub progress_interval: Duration,
    pub lock_duration: Duration,
}

impl WorkerContext {
    pub fn from_config(queue: JobQueue, cfg: &MfetchConfig) -> Self {
        Self {
            queue,
            download_dir: cfg.download_dir.clone(),
            binaries: cfg.binaries.clone(),
            progress_interval: cfg.progress_interval(),
            lock_duration: cfg.lock_duration(),
        }
    }

    /// Heartbeats go out three times per lock period.
    pub(crate) fn heartbeat_interval(&self) -> Duration {
        (self.lock_duration / 3).max(Duration::from_millis(10))
    }
}

pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(ctx: WorkerContext, concurrency: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run all workers until `stop` turns true (or its sender is dropped).
    /// Jobs in flight are finished first; no new job is claimed after the signal.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> Result<()> {
        let mut join_set = JoinSet::new();
        for worker in 0..self.concurrency {
            join_set.spawn(worker_loop(
                Arc::clone(&self.ctx),
                worker,
                stop.clone(),
            ));
        }
        join_set.spawn(reclaim_loop(Arc::clone(&self.ctx), stop));
        tracing::info!(workers = self.concurrency, "worker pool started");

        while let Some(res) = join_set.join_next().await {
            if let Err(e) = res {
                tracing::error!("worker loop ended abnormally: {}", e);
            }
        }
        tracing::info!("worker pool stopped");
        Ok(())
    }
}

async fn worker_loop(ctx: Arc<WorkerContext>, worker: usize, mut stop: watch::Receiver<bool>) {
    tracing::debug!(worker, "worker started");
    while !shutdown::is_requested(&stop) {
        let claimed = tokio::select! {
            _ = shutdown::requested(&mut stop) => break,
            res = ctx.queue.dequeue() => res,
        };
        let claim = match claimed {
            Ok(claim) => claim,
            Err(e) => {
                tracing::warn!(worker, "dequeue failed: {:#}", e);
                tokio::time::sleep(DEQUEUE_ERROR_PAUSE).await;
                continue;
            }
        };
        process_claim(&ctx, worker, claim).await;
    }
    tracing::debug!(worker, "worker stopped");
}

/// Execute one claimed job and record its outcome. Never panics; a panic in
/// the job itself is caught at the task boundary and recorded as a failure.
async fn process_claim(ctx: &Arc<WorkerContext>, worker: usize, claim: Claim) {
    let task = {
        let ctx = Arc::clone(ctx);
        let claim = claim.clone();
        tokio::spawn(async move { execute_job(&ctx, &claim).await })
    };

    record_outcome(ctx, worker, &claim, task.await).await;
}

/// Write the result of a joined job task to the queue: complete on success,
/// fail (with retry) on an error or a panicked task.
async fn record_outcome(
    ctx: &WorkerContext,
    worker: usize,
    claim: &Claim,
    joined: Result<Result<String, JobError>, JoinError>,
) {
    let job_id = claim.id();
    let failure = match joined {
        Ok(Ok(file)) => {
            match ctx.queue.complete(claim, &file).await {
                Ok(true) => tracing::info!(worker, job = job_id, file = %file, "job completed"),
                Ok(false) => tracing::warn!(worker, job = job_id, "completion ignored: claim lost"),
                Err(e) => tracing::error!(worker, job = job_id, "recording completion failed: {:#}", e),
            }
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(join_err) => format!("worker task failed: {join_err}"),
    };

    let failure = if failure.trim().is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        failure
    };
    match ctx.queue.fail(claim, &failure).await {
        Ok(FailOutcome::Retrying { attempt, delay }) => tracing::warn!(
            worker,
            job = job_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, retrying: {}",
            failure
        ),
        Ok(FailOutcome::Failed) => {
            tracing::error!(worker, job = job_id, "job failed: {}", failure)
        }
        Ok(FailOutcome::Stale) => {
            tracing::warn!(worker, job = job_id, "failure ignored: claim lost")
        }
        Err(e) => tracing::error!(worker, job = job_id, "recording failure failed: {:#}", e),
    }
}

async fn reclaim_loop(ctx: Arc<WorkerContext>, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(ctx.lock_duration);
    loop {
        tokio::select! {
            _ = shutdown::requested(&mut stop) => break,
            _ = ticker.tick() => {}
        }
        match ctx.queue.reclaim_stalled().await {
            Ok((0, 0)) => {}
            Ok((requeued, failed)) => {
                tracing::warn!(requeued, failed, "reclaimed stalled jobs")
            }
            Err(e) => tracing::warn!("stall reclaim failed: {:#}", e),
        }
    }
}
