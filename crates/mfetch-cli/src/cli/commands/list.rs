//! `mfetch list` – table of all jobs.

use anyhow::Result;
use mfetch_core::queue::JobQueue;

pub async fn run_list(queue: &JobQueue) -> Result<()> {
    let jobs = queue.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in queue.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:<6} {:<8} {:<28} {}",
        "ID", "STATE", "KIND", "ATTEMPTS", "FILE", "URL"
    );
    for j in jobs {
        println!(
            "{:<6} {:<10} {:<6} {:<8} {:<28} {}",
            j.id,
            j.state.as_str(),
            j.kind.as_str(),
            j.attempts_made,
            j.result_file.as_deref().unwrap_or("-"),
            j.url
        );
    }
    Ok(())
}
