//! Bounded retention of finished jobs.

use anyhow::Result;

use super::super::db::JobQueue;
use super::super::types::JobState;

impl JobQueue {
    /// Delete the oldest jobs in terminal `state` beyond the newest `keep`.
    /// Completed and failed jobs are pruned independently. Returns rows removed.
    pub(crate) async fn prune_finished(&self, state: JobState, keep: u32) -> Result<u64> {
        debug_assert!(state.is_terminal());
        let r = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state = ?1
              AND id NOT IN (
                  SELECT id FROM jobs
                  WHERE state = ?1
                  ORDER BY finished_at DESC, id DESC
                  LIMIT ?2
              )
            "#,
        )
        .bind(state.as_str())
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await?;
        let removed = r.rows_affected();
        if removed > 0 {
            tracing::debug!(state = state.as_str(), removed, "pruned finished jobs");
        }
        Ok(removed)
    }
}
