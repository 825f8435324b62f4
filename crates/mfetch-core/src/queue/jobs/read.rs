//! Job read operations: get and list.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::JobQueue;
use super::super::types::{JobId, JobParams, JobRecord, JobState, JobSummary, MediaKind, Progress};

/// Columns selected (or returned) for a full `JobRecord`.
pub(crate) const JOB_COLUMNS: &str = "id, url, kind, quality, state, attempts_made, progress_json, \
     result_file, error, available_at, created_at, updated_at, finished_at";

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let kind_str: String = row.get("kind");
    let kind = kind_str.parse::<MediaKind>().map_err(anyhow::Error::msg)?;
    let state_str: String = row.get("state");
    let attempts_made: i64 = row.get("attempts_made");
    let progress_json: Option<String> = row.get("progress_json");

    // A corrupt snapshot must not make the job unreadable.
    let progress = progress_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str::<Progress>(s).ok());

    Ok(JobRecord {
        id: row.get("id"),
        params: JobParams {
            url: row.get("url"),
            kind,
            quality: row.get("quality"),
        },
        state: JobState::from_str(&state_str),
        attempts_made: u32::try_from(attempts_made).unwrap_or(0),
        progress,
        result_file: row.get("result_file"),
        error: row.get("error"),
        available_at: row.get("available_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        finished_at: row.get("finished_at"),
    })
}

impl JobQueue {
    /// Fetch a single job. Never blocks on workers; reflects the last committed write.
    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// List all jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, kind, state, attempts_made, result_file
            FROM jobs
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let state: String = row.get("state");
            let attempts_made: i64 = row.get("attempts_made");
            out.push(JobSummary {
                id: row.get("id"),
                url: row.get("url"),
                kind: kind.parse().unwrap_or_default(),
                state: JobState::from_str(&state),
                attempts_made: u32::try_from(attempts_made).unwrap_or(0),
                result_file: row.get("result_file"),
            });
        }
        Ok(out)
    }

    /// Number of jobs currently in `state`.
    pub async fn count_in_state(&self, state: JobState) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = ?1")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
