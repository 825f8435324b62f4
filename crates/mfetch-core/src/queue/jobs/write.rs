//! Job write operations: enqueue, claim, progress, terminal transitions, recovery.

use anyhow::{Context, Result};

use super::super::db::{millis, unix_millis, JobQueue};
use super::super::types::{Claim, FailOutcome, JobId, JobParams, JobState, Progress};
use super::read::{job_from_row, JOB_COLUMNS};
use crate::retry::RetryDecision;

/// Failure text stored for jobs whose claim expired on the last allowed attempt.
pub const STALLED_ERROR: &str = "job stalled: worker stopped reporting before finishing";

impl JobQueue {
    /// Persist a new waiting job and return its id. Does not wait for execution.
    ///
    /// Only the presence of a URL is checked here; richer validation belongs to the caller.
    pub async fn enqueue(&self, params: &JobParams) -> Result<JobId> {
        if params.url.trim().is_empty() {
            anyhow::bail!("job url is empty");
        }
        let now = unix_millis();
        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                url, kind, quality, state, attempts_made,
                available_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5, ?5)
            "#,
        )
        .bind(&params.url)
        .bind(params.kind.as_str())
        .bind(&params.quality)
        .bind(JobState::Waiting.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .context("enqueue job")?
        .last_insert_rowid();

        self.wake_workers();
        Ok(id)
    }

    /// Atomically claim the next claimable waiting job (oldest `available_at`,
    /// then smallest id) by switching it to active and counting the attempt.
    ///
    /// The select and the update are one statement, so concurrent callers
    /// (tasks or processes) never receive the same job.
    pub async fn try_dequeue(&self) -> Result<Option<Claim>> {
        let now = unix_millis();
        let locked_until = now.saturating_add(millis(self.opts.lock_duration));
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'active',
                attempts_made = attempts_made + 1,
                locked_until = ?1,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'waiting' AND available_at <= ?2
                ORDER BY available_at ASC, id ASC
                LIMIT 1
            )
            AND state = 'waiting'
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(locked_until)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .context("claim next job")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job = job_from_row(&row)?;
        let attempt = job.attempts_made;
        Ok(Some(Claim { job, attempt }))
    }

    /// Claim the next job, suspending until one is available.
    ///
    /// Wakes on in-process enqueues and otherwise polls, so jobs submitted by
    /// other processes and delayed retries are picked up too.
    pub async fn dequeue(&self) -> Result<Claim> {
        loop {
            let notified = self.notify.notified();
            if let Some(claim) = self.try_dequeue().await? {
                return Ok(claim);
            }
            if self.pool.is_closed() {
                anyhow::bail!("job queue is closed");
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(self.opts.poll_interval) => {}
            }
        }
    }

    /// Overwrite the progress snapshot of an active job.
    ///
    /// Returns false (and writes nothing) when the claim is no longer current,
    /// e.g. the job already reached a terminal state.
    pub async fn report_progress(&self, claim: &Claim, progress: &Progress) -> Result<bool> {
        let json = serde_json::to_string(progress)?;
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET progress_json = ?1,
                updated_at = ?2
            WHERE id = ?3 AND state = 'active' AND attempts_made = ?4
            "#,
        )
        .bind(json)
        .bind(unix_millis())
        .bind(claim.id())
        .bind(i64::from(claim.attempt))
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Push the claim deadline forward. Returns false if the claim was lost.
    pub async fn heartbeat(&self, claim: &Claim) -> Result<bool> {
        let now = unix_millis();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET locked_until = ?1
            WHERE id = ?2 AND state = 'active' AND attempts_made = ?3
            "#,
        )
        .bind(now.saturating_add(millis(self.opts.lock_duration)))
        .bind(claim.id())
        .bind(i64::from(claim.attempt))
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Transition active -> completed and store the output file name.
    /// Returns false if the claim was no longer current.
    pub async fn complete(&self, claim: &Claim, result_file: &str) -> Result<bool> {
        let now = unix_millis();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed',
                result_file = ?1,
                error = NULL,
                locked_until = NULL,
                updated_at = ?2,
                finished_at = ?2
            WHERE id = ?3 AND state = 'active' AND attempts_made = ?4
            "#,
        )
        .bind(result_file)
        .bind(now)
        .bind(claim.id())
        .bind(i64::from(claim.attempt))
        .execute(&self.pool)
        .await
        .context("complete job")?;

        if r.rows_affected() == 0 {
            return Ok(false);
        }
        self.prune_finished(JobState::Completed, self.opts.keep_completed)
            .await?;
        Ok(true)
    }

    /// Record a failed attempt. With attempts left the job goes back to
    /// waiting after the policy's backoff; otherwise it becomes terminally
    /// failed with `error` stored.
    pub async fn fail(&self, claim: &Claim, error: &str) -> Result<FailOutcome> {
        let now = unix_millis();
        match self.opts.retry.decide(claim.attempt) {
            RetryDecision::RetryAfter(delay) => {
                let r = sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'waiting',
                        available_at = ?1,
                        locked_until = NULL,
                        updated_at = ?2
                    WHERE id = ?3 AND state = 'active' AND attempts_made = ?4
                    "#,
                )
                .bind(now.saturating_add(millis(delay)))
                .bind(now)
                .bind(claim.id())
                .bind(i64::from(claim.attempt))
                .execute(&self.pool)
                .await
                .context("schedule job retry")?;
                if r.rows_affected() == 0 {
                    return Ok(FailOutcome::Stale);
                }
                Ok(FailOutcome::Retrying {
                    attempt: claim.attempt,
                    delay,
                })
            }
            RetryDecision::NoRetry => {
                let r = sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'failed',
                        error = ?1,
                        locked_until = NULL,
                        updated_at = ?2,
                        finished_at = ?2
                    WHERE id = ?3 AND state = 'active' AND attempts_made = ?4
                    "#,
                )
                .bind(error)
                .bind(now)
                .bind(claim.id())
                .bind(i64::from(claim.attempt))
                .execute(&self.pool)
                .await
                .context("fail job")?;
                if r.rows_affected() == 0 {
                    return Ok(FailOutcome::Stale);
                }
                self.prune_finished(JobState::Failed, self.opts.keep_failed)
                    .await?;
                Ok(FailOutcome::Failed)
            }
        }
    }

    /// Normalize any job left active (e.g. after a crash) back to waiting.
    /// Call before starting workers so stranded jobs are picked up again.
    /// Returns the number of jobs reset.
    pub async fn recover_running_jobs(&self) -> Result<u64> {
        let now = unix_millis();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'waiting',
                available_at = ?1,
                locked_until = NULL,
                updated_at = ?1
            WHERE state = 'active'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() > 0 {
            self.wake_workers();
        }
        Ok(r.rows_affected())
    }

    /// Release active jobs whose claim deadline passed without a heartbeat.
    ///
    /// Jobs that already used their last attempt fail with `STALLED_ERROR`;
    /// the rest become waiting again. Returns (requeued, failed).
    pub async fn reclaim_stalled(&self) -> Result<(u64, u64)> {
        let now = unix_millis();
        let max_attempts = i64::from(self.opts.retry.max_attempts);
        let mut tx = self.pool.begin().await?;

        let failed = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed',
                error = ?1,
                locked_until = NULL,
                updated_at = ?2,
                finished_at = ?2
            WHERE state = 'active'
              AND locked_until IS NOT NULL AND locked_until < ?2
              AND attempts_made >= ?3
            "#,
        )
        .bind(STALLED_ERROR)
        .bind(now)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'waiting',
                available_at = ?1,
                locked_until = NULL,
                updated_at = ?1
            WHERE state = 'active'
              AND locked_until IS NOT NULL AND locked_until < ?1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if failed > 0 {
            self.prune_finished(JobState::Failed, self.opts.keep_failed)
                .await?;
        }
        if requeued > 0 {
            self.wake_workers();
        }
        Ok((requeued, failed))
    }
}
