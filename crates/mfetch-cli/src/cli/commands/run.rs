//! `mfetch run` – worker pool plus retention sweeper until Ctrl-C.

use anyhow::{Context, Result};
use mfetch_core::config::MfetchConfig;
use mfetch_core::naming::FILE_PREFIX;
use mfetch_core::queue::JobQueue;
use mfetch_core::scheduler::{WorkerContext, WorkerPool};
use mfetch_core::shutdown;
use mfetch_core::sweeper::run_sweeper;

pub async fn run_workers(queue: &JobQueue, cfg: &MfetchConfig, jobs: Option<usize>) -> Result<()> {
    let recovered = queue.recover_running_jobs().await?;
    if recovered > 0 {
        tracing::info!("recovered {} job(s) from previous run", recovered);
    }
    tokio::fs::create_dir_all(&cfg.download_dir)
        .await
        .with_context(|| format!("create output dir {}", cfg.download_dir.display()))?;

    let pool = WorkerPool::new(
        WorkerContext::from_config(queue.clone(), cfg),
        jobs.unwrap_or(cfg.concurrency),
    );
    let (stop_tx, stop_rx) = shutdown::channel();

    let sweeper = {
        let dir = cfg.download_dir.clone();
        let ttl = cfg.file_ttl();
        let interval = cfg.cleanup_interval();
        let stop = stop_rx.clone();
        tokio::spawn(async move { run_sweeper(&dir, FILE_PREFIX, ttl, interval, stop).await })
    };

    let signal = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                println!("Stopping: finishing jobs in flight...");
                tracing::info!("shutdown requested");
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                tracing::warn!("cannot listen for Ctrl-C: {}", e);
                // Dropping the sender would stop the workers.
                let _keep = stop_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    println!(
        "Running {} worker(s), output in {}. Press Ctrl-C to stop.",
        pool.concurrency(),
        cfg.download_dir.display()
    );
    pool.run(stop_rx).await?;
    sweeper.await.context("sweeper task")?;
    signal.abort();
    println!("Stopped.");
    Ok(())
}
