//! Types used by the job queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Job identifier (SQLite row id).
pub type JobId = i64;

/// Quality used when a submission does not name one.
pub const DEFAULT_QUALITY: &str = "best";

/// Job state stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "waiting" => JobState::Waiting,
            "active" => JobState::Active,
            "completed" => JobState::Completed,
            _ => JobState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// What the job should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Mp3,
    Thumb,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Mp3 => "mp3",
            MediaKind::Thumb => "thumb",
        }
    }

    pub fn is_audio(self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Mp3)
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            "mp3" => Ok(MediaKind::Mp3),
            "thumb" => Ok(MediaKind::Thumb),
            other => Err(format!(
                "unknown kind {other:?} (expected video, audio, mp3 or thumb)"
            )),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable job parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    pub url: String,
    pub kind: MediaKind,
    pub quality: String,
}

impl JobParams {
    pub fn new(url: impl Into<String>, kind: MediaKind, quality: Option<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            quality: quality
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
        }
    }
}

/// Stage the external tool is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Download,
    Merge,
    Convert,
    Processing,
    Done,
}

/// Latest progress snapshot of a job. Overwritten on every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub pct: f64,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
}

impl Progress {
    pub fn new(pct: f64, phase: Phase) -> Self {
        Self {
            pct: pct.clamp(0.0, 100.0),
            phase,
            speed: None,
            eta: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pct >= 100.0
    }
}

/// Full job record.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub params: JobParams,
    pub state: JobState,
    pub attempts_made: u32,
    pub progress: Option<Progress>,
    /// Output file name (set only when completed).
    pub result_file: Option<String>,
    /// Failure description (set only when terminally failed).
    pub error: Option<String>,
    pub available_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub finished_at: Option<i64>,
}

/// Summary row used by the CLI `list` command.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub url: String,
    pub kind: MediaKind,
    pub state: JobState,
    pub attempts_made: u32,
    pub result_file: Option<String>,
}

/// Exclusive hold on an active job, returned by `dequeue`.
///
/// `attempt` is the value of `attempts_made` written by the claim; every
/// later write for this job is conditioned on it.
#[derive(Debug, Clone)]
pub struct Claim {
    pub job: JobRecord,
    pub attempt: u32,
}

impl Claim {
    pub fn id(&self) -> JobId {
        self.job.id
    }
}

/// What `fail` did with the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to waiting; claimable again after `delay`.
    Retrying { attempt: u32, delay: Duration },
    /// No attempts left; error stored.
    Failed,
    /// The claim was no longer current (job reclaimed or already terminal).
    Stale,
}
