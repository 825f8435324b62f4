//! Submission and status façade.
//!
//! The thin layer a front end (the CLI here, an HTTP server elsewhere) talks
//! to: validates submissions before they reach the queue, renders job
//! records as status views and turns client-supplied file names into paths
//! inside the output directory.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::naming::safe_download_name;
use crate::queue::{JobId, JobParams, JobQueue, JobRecord, JobState, MediaKind, Progress};

/// Reported for a failed job that has no stored description.
pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed submission; never enqueued.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Unknown job id, or a file that is not (or no longer) there.
    #[error("not found: {0}")]
    NotFound(String),
    /// The queue backend failed. Submissions are rejected, never buffered.
    #[error("queue unavailable: {0:#}")]
    Queue(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// What a status call reports about one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: JobId,
    pub status: JobState,
    pub url: String,
    /// Output file name; set once the job completed.
    pub file: Option<String>,
    pub progress: Option<Progress>,
    /// Failure description; set only for failed jobs.
    pub error: Option<String>,
    pub attempts_made: u32,
}

impl From<JobRecord> for JobStatusView {
    fn from(job: JobRecord) -> Self {
        let error = match job.state {
            JobState::Failed => Some(
                job.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ),
            _ => None,
        };
        Self {
            id: job.id,
            status: job.state,
            url: job.params.url,
            file: job.result_file.filter(|_| job.state == JobState::Completed),
            progress: job.progress,
            error,
            attempts_made: job.attempts_made,
        }
    }
}

#[derive(Clone)]
pub struct MediaService {
    queue: JobQueue,
    download_dir: PathBuf,
}

impl MediaService {
    pub fn new(queue: JobQueue, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue,
            download_dir: download_dir.into(),
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Validate and enqueue a job. `kind` defaults to video and `quality` to best.
    pub async fn submit(&self, url: &str, kind: Option<&str>, quality: Option<&str>) -> Result<JobId> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ServiceError::Validation("url is required".into()));
        }
        let kind = match kind.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => k.parse::<MediaKind>().map_err(ServiceError::Validation)?,
            None => MediaKind::default(),
        };
        let params = JobParams::new(url, kind, quality.map(|q| q.trim().to_string()));
        let id = self.queue.enqueue(&params).await?;
        tracing::info!(job = id, url, kind = %params.kind, quality = %params.quality, "job submitted");
        Ok(id)
    }

    /// Current view of job `id`.
    pub async fn status(&self, id: JobId) -> Result<JobStatusView> {
        self.queue
            .get_job(id)
            .await?
            .map(JobStatusView::from)
            .ok_or_else(|| ServiceError::NotFound(format!("job {id}")))
    }

    /// Path of the finished file called `name`. The name is checked before
    /// anything touches the filesystem; only bare names carrying the owner
    /// prefix are accepted.
    pub async fn resolve_download(&self, name: &str) -> Result<PathBuf> {
        let Some(name) = safe_download_name(name) else {
            tracing::warn!(requested = name, "rejected download name");
            return Err(ServiceError::Validation(format!("invalid file name {name:?}")));
        };
        let path = self.download_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ServiceError::NotFound(format!("file {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Phase, QueueOptions};
    use crate::retry::RetryPolicy;

    async fn service(dir: &Path, opts: QueueOptions) -> MediaService {
        MediaService::new(JobQueue::open_memory(opts).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn submit_applies_defaults_and_trims() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), QueueOptions::default()).await;
        let id = svc.submit("  http://x/video  ", None, None).await.unwrap();

        let job = svc.queue().get_job(id).await.unwrap().unwrap();
        assert_eq!(job.params.url, "http://x/video");
        assert_eq!(job.params.kind, MediaKind::Video);
        assert_eq!(job.params.quality, "best");

        let id = svc
            .submit("http://x/a", Some("mp3"), Some("720"))
            .await
            .unwrap();
        let job = svc.queue().get_job(id).await.unwrap().unwrap();
        assert_eq!(job.params.kind, MediaKind::Mp3);
        assert_eq!(job.params.quality, "720");
    }

    #[tokio::test]
    async fn invalid_submissions_never_reach_the_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), QueueOptions::default()).await;
        assert!(matches!(
            svc.submit("   ", None, None).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.submit("http://x", Some("gif"), None).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(svc.queue().list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_is_rejected_when_queue_is_down() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), QueueOptions::default()).await;
        svc.queue().close().await;
        assert!(matches!(
            svc.submit("http://x/v", None, None).await,
            Err(ServiceError::Queue(_))
        ));
    }

    #[tokio::test]
    async fn status_of_waiting_and_unknown_jobs() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), QueueOptions::default()).await;
        let id = svc.submit("http://x/v", Some("thumb"), None).await.unwrap();

        let view = svc.status(id).await.unwrap();
        assert_eq!(view.status, JobState::Waiting);
        assert_eq!(view.url, "http://x/v");
        assert!(view.file.is_none() && view.error.is_none() && view.progress.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "waiting");
        assert!(json["file"].is_null());
        assert_eq!(json["attemptsMade"], 0);

        assert!(matches!(
            svc.status(id + 100).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn completed_and_failed_views() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = QueueOptions {
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..QueueOptions::default()
        };
        let svc = service(tmp.path(), opts).await;
        let q = svc.queue();

        let ok = svc.submit("http://x/ok", None, None).await.unwrap();
        let claim = q.try_dequeue().await.unwrap().unwrap();
        q.report_progress(&claim, &Progress::new(100.0, Phase::Done))
            .await
            .unwrap();
        q.complete(&claim, "mfetch_00aa.mp4").await.unwrap();
        let view = svc.status(ok).await.unwrap();
        assert_eq!(view.status, JobState::Completed);
        assert_eq!(view.file.as_deref(), Some("mfetch_00aa.mp4"));
        assert_eq!(view.progress.map(|p| p.pct), Some(100.0));

        let bad = svc.submit("http://x/bad", None, None).await.unwrap();
        let claim = q.try_dequeue().await.unwrap().unwrap();
        q.fail(&claim, "").await.unwrap();
        let view = svc.status(bad).await.unwrap();
        assert_eq!(view.status, JobState::Failed);
        assert_eq!(view.error.as_deref(), Some(UNKNOWN_ERROR));
        assert!(view.file.is_none());
    }

    #[tokio::test]
    async fn resolve_download_guards_the_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mfetch_0123.mp3"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        let svc = service(tmp.path(), QueueOptions::default()).await;

        assert_eq!(
            svc.resolve_download("mfetch_0123.mp3").await.unwrap(),
            tmp.path().join("mfetch_0123.mp3")
        );
        for bad in ["../../etc/passwd", "notes.txt", "mfetch_x/../../a", ".."] {
            assert!(matches!(
                svc.resolve_download(bad).await,
                Err(ServiceError::Validation(_))
            ));
        }
        assert!(matches!(
            svc.resolve_download("mfetch_ffff.mp4").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
