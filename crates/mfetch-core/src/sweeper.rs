//! Retention sweeper: deletes owned output files older than the TTL.
//!
//! Only regular files whose name starts with the owner prefix are ever
//! considered. Everything else in the directory is left alone, whatever its age.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use crate::naming::has_owner_prefix;
use crate::shutdown;

/// Outcome of one pass over the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: u64,
    pub errors: u64,
}

/// True if `name` is a candidate for deletion under `prefix`.
fn is_candidate(name: &str, prefix: &str) -> bool {
    !name.starts_with('.') && has_owner_prefix(name, prefix)
}

/// One sweep of `dir` as seen at `now`. Per-file errors are logged and
/// counted; they never stop the pass. A missing directory is an empty sweep.
pub async fn sweep_once(dir: &Path, prefix: &str, ttl: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "output directory missing; nothing to sweep");
            return report;
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "cannot list output directory: {}", e);
            report.errors += 1;
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "listing interrupted: {}", e);
                report.errors += 1;
                break;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_candidate(name, prefix) {
            continue;
        }

        match expired(&entry, ttl, now).await {
            Ok(false) => {}
            Ok(true) => match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::info!(file = name, "removed expired file");
                    report.deleted += 1;
                }
                // Already gone: someone else cleaned it up.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = name, "cannot remove expired file: {}", e);
                    report.errors += 1;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(file = name, "cannot stat file: {}", e);
                report.errors += 1;
            }
        }
    }
    report
}

/// Regular file whose mtime is more than `ttl` before `now`.
async fn expired(entry: &tokio::fs::DirEntry, ttl: Duration, now: SystemTime) -> io::Result<bool> {
    let meta = entry.metadata().await?;
    if !meta.is_file() {
        return Ok(false);
    }
    let modified = meta.modified()?;
    // An mtime in the future reads as age zero.
    let age = now.duration_since(modified).unwrap_or_default();
    Ok(age > ttl)
}

/// Sweep at once, then every `interval`, until `stop` turns true or its
/// sender is dropped.
pub async fn run_sweeper(
    dir: &Path,
    prefix: &str,
    ttl: Duration,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!(
        dir = %dir.display(),
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "sweeper started"
    );
    loop {
        tokio::select! {
            _ = shutdown::requested(&mut stop) => break,
            _ = ticker.tick() => {}
        }
        let report = sweep_once(dir, prefix, ttl, SystemTime::now()).await;
        if report.deleted > 0 || report.errors > 0 {
            tracing::info!(deleted = report.deleted, errors = report.errors, "sweep finished");
        }
    }
    tracing::debug!("sweeper stopped");
}
