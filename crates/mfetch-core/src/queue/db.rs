//! SQLite-backed queue implementation.
//!
//! Handles connection, migrations, wake-ups and timestamp helpers. Job
//! transitions live in `jobs`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

use crate::config::MfetchConfig;
use crate::retry::RetryPolicy;

/// Tuning knobs of the queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Attempt cap and backoff applied by `fail`.
    pub retry: RetryPolicy,
    /// Completed records kept after pruning.
    pub keep_completed: u32,
    /// Failed records kept after pruning.
    pub keep_failed: u32,
    /// Claim validity without heartbeat.
    pub lock_duration: Duration,
    /// Fallback polling period of `dequeue` (other processes, delayed retries).
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            keep_completed: 100,
            keep_failed: 100,
            lock_duration: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl QueueOptions {
    pub fn from_config(cfg: &MfetchConfig) -> Self {
        Self {
            retry: cfg.retry.policy(),
            keep_completed: cfg.keep_completed,
            keep_failed: cfg.keep_failed,
            lock_duration: cfg.lock_duration(),
            ..Self::default()
        }
    }
}

/// Handle to the durable job queue. Cheap to clone; clones share the pool
/// and the in-process wake-up signal.
#[derive(Clone)]
pub struct JobQueue {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) notify: Arc<Notify>,
    pub(crate) opts: QueueOptions,
}

impl JobQueue {
    /// Default database location: `~/.local/state/mfetch/jobs.db`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mfetch")?;
        Ok(xdg_dirs.get_state_home().join("jobs.db"))
    }

    /// Open (or create) the database at the default path with default options.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?, QueueOptions::default()).await
    }

    /// Open the database named by the config (or the default one) and run migrations.
    pub async fn open_from_config(cfg: &MfetchConfig) -> Result<Self> {
        let path = match &cfg.queue_db {
            Some(p) => p.clone(),
            None => Self::default_path()?,
        };
        Self::open_at(&path, QueueOptions::from_config(cfg)).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>, opts: QueueOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create queue dir {}", parent.display()))?;
        }
        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(connect)
            .await
            .with_context(|| format!("open queue database {}", path.display()))?;
        let queue = JobQueue {
            pool,
            notify: Arc::new(Notify::new()),
            opts,
        };
        queue.migrate().await?;
        tracing::debug!(path = %path.display(), "job queue opened");
        Ok(queue)
    }

    /// Open a private in-memory database (tests, throwaway runs).
    pub async fn open_memory(opts: QueueOptions) -> Result<Self> {
        // A single connection that never expires: the in-memory DB dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let queue = JobQueue {
            pool,
            notify: Arc::new(Notify::new()),
            opts,
        };
        queue.migrate().await?;
        Ok(queue)
    }

    pub fn options(&self) -> &QueueOptions {
        &self.opts
    }

    /// Close the pool. In-flight queries finish; later calls fail.
    pub async fn close(&self) {
        self.notify.notify_waiters();
        self.pool.close().await;
    }

    pub(crate) fn wake_workers(&self) {
        self.notify.notify_waiters();
    }

    async fn migrate(&self) -> Result<()> {
        // - `progress_json` holds the latest progress snapshot only.
        // - `available_at` delays a retried job; a job is claimable when it is
        //   waiting and `available_at <= now`.
        // - `locked_until` is the claim deadline, pushed forward by heartbeats.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                kind TEXT NOT NULL,
                quality TEXT NOT NULL,
                state TEXT NOT NULL,
                attempts_made INTEGER NOT NULL DEFAULT 0,
                progress_json TEXT,
                result_file TEXT,
                error TEXT,
                available_at INTEGER NOT NULL,
                locked_until INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                finished_at INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS jobs_by_state
            ON jobs (state, available_at, id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix milliseconds (for DB timestamps).
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(crate) fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
