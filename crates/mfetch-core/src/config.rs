use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per job (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; doubles per attempt (1s, 2s, 4s, ...).
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_secs: 300,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// External binaries invoked by the workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinariesConfig {
    /// Media downloader (yt-dlp compatible command line).
    pub ytdlp: String,
    /// Transcoder used for the AAC post-processing step.
    pub ffmpeg: String,
    /// JavaScript runtime handed to the downloader via `--js-runtimes`.
    pub js_runtime: String,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            js_runtime: "node".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/mfetch/config.toml`, then
/// overridden by `MFETCH_*` environment variables. Missing keys take their
/// default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MfetchConfig {
    /// SQLite queue database. None = `~/.local/state/mfetch/jobs.db`.
    pub queue_db: Option<PathBuf>,
    /// Shared output directory for finished files.
    pub download_dir: PathBuf,
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Output files older than this are removed by the sweeper.
    pub file_ttl_hours: u64,
    /// Minutes between two sweeps.
    pub cleanup_interval_min: u64,
    /// Finished job records kept per terminal state (completed / failed).
    pub keep_completed: u32,
    pub keep_failed: u32,
    /// Minimum spacing between two progress writes for one job.
    pub progress_interval_ms: u64,
    /// How long a claim stays valid without a heartbeat before the job is reclaimed.
    pub lock_duration_secs: u64,
    pub retry: RetryConfig,
    pub binaries: BinariesConfig,
}

impl Default for MfetchConfig {
    fn default() -> Self {
        Self {
            queue_db: None,
            download_dir: PathBuf::from("downloaded"),
            concurrency: 2,
            file_ttl_hours: 12,
            cleanup_interval_min: 30,
            keep_completed: 100,
            keep_failed: 100,
            progress_interval_ms: 500,
            lock_duration_secs: 30,
            retry: RetryConfig::default(),
            binaries: BinariesConfig::default(),
        }
    }
}

impl MfetchConfig {
    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_hours.saturating_mul(3600))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_min.max(1).saturating_mul(60))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.lock_duration_secs.max(1))
    }

    /// Apply `MFETCH_*` overrides from the given lookup (usually `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MFETCH_QUEUE_DB") {
            self.queue_db = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MFETCH_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MFETCH_CONCURRENCY") {
            self.concurrency = v.trim().parse().context("MFETCH_CONCURRENCY")?;
        }
        if let Some(v) = lookup("MFETCH_FILE_TTL_HOURS") {
            self.file_ttl_hours = v.trim().parse().context("MFETCH_FILE_TTL_HOURS")?;
        }
        if let Some(v) = lookup("MFETCH_CLEANUP_INTERVAL_MIN") {
            self.cleanup_interval_min = v.trim().parse().context("MFETCH_CLEANUP_INTERVAL_MIN")?;
        }
        if let Some(v) = lookup("MFETCH_YTDLP_BIN") {
            self.binaries.ytdlp = v;
        }
        if let Some(v) = lookup("MFETCH_FFMPEG_BIN") {
            self.binaries.ffmpeg = v;
        }
        if let Some(v) = lookup("MFETCH_JS_RUNTIME") {
            self.binaries.js_runtime = v;
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MfetchConfig = toml::from_str(&data)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Config file (or defaults when it is unusable) with environment overrides applied.
pub fn load_with_env() -> Result<MfetchConfig> {
    let mut cfg = match load_or_init() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("config file unavailable, using defaults: {:#}", e);
            MfetchConfig::default()
        }
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let cfg = MfetchConfig::default();
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.file_ttl_hours, 12);
        assert_eq!(cfg.cleanup_interval_min, 30);
        assert_eq!(cfg.keep_completed, 100);
        assert_eq!(cfg.keep_failed, 100);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
        assert_eq!(cfg.binaries.ytdlp, "yt-dlp");
        assert!(cfg.queue_db.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = MfetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.concurrency, cfg.concurrency);
        assert_eq!(parsed.download_dir, cfg.download_dir);
        assert_eq!(parsed.retry.max_attempts, cfg.retry.max_attempts);
    }

    #[test]
    fn config_toml_without_optional_sections() {
        let toml = r#"
            download_dir = "/srv/media"
            concurrency = 4
            file_ttl_hours = 6
            cleanup_interval_min = 10
            keep_completed = 50
            keep_failed = 20
            progress_interval_ms = 250
            lock_duration_secs = 60
        "#;
        let cfg: MfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.file_ttl(), Duration::from_secs(6 * 3600));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.binaries.ffmpeg, "ffmpeg");
    }

    #[test]
    fn partial_config_keeps_given_keys_and_defaults_the_rest() {
        let toml = r#"
            download_dir = "/srv/media"

            [binaries]
            ytdlp = "/opt/yt-dlp"
        "#;
        let cfg: MfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(cfg.binaries.ytdlp, "/opt/yt-dlp");
        assert_eq!(cfg.binaries.ffmpeg, "ffmpeg");
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.keep_completed, 100);
        assert_eq!(cfg.progress_interval(), Duration::from_millis(500));
        assert_eq!(cfg.lock_duration(), Duration::from_secs(30));
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("MFETCH_DOWNLOAD_DIR", "/tmp/out"),
            ("MFETCH_CONCURRENCY", "5"),
            ("MFETCH_FILE_TTL_HOURS", "1"),
            ("MFETCH_YTDLP_BIN", "/opt/yt-dlp"),
        ]
        .into_iter()
        .collect();
        let mut cfg = MfetchConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.concurrency, 5);
        assert_eq!(cfg.file_ttl_hours, 1);
        assert_eq!(cfg.binaries.ytdlp, "/opt/yt-dlp");
        assert_eq!(cfg.binaries.ffmpeg, "ffmpeg");
    }

    #[test]
    fn env_override_rejects_garbage_numbers() {
        let mut cfg = MfetchConfig::default();
        let err = cfg
            .apply_env(|k| (k == "MFETCH_CONCURRENCY").then(|| "many".to_string()))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("MFETCH_CONCURRENCY"));
    }

    #[test]
    fn retry_config_builds_policy() {
        let p = RetryConfig::default().policy();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(1000));
    }
}
