//! Fake external tools for integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mfetch_core::config::BinariesConfig;
use mfetch_core::queue::{JobId, JobQueue, JobRecord, QueueOptions};
use mfetch_core::retry::RetryPolicy;

/// Downloader stand-in: logs its arguments next to itself, prints progress
/// and writes the output named by `-o` with extension `$EXT` (default mp4).
pub const FAKE_DOWNLOADER: &str = r#"#!/bin/sh
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
printf '%s\n' "$@" > "$(dirname "$0")/last-args"
printf '[youtube] abc: Downloading webpage\n'
printf '[download]   5.0%% of 2.00MiB at 2.00MiB/s ETA 00:02\n'
printf '[download]  60.0%% of 2.00MiB at 2.00MiB/s ETA 00:01\n'
printf '[download] 100%% of 2.00MiB in 00:00:01\n'
printf '[Merger] Merging formats into "%s"\n' "$out"
file=$(printf '%s' "$out" | sed "s/%(ext)s/${EXT:-mp4}/")
printf 'media' > "$file"
"#;

/// Always fails with a recognisable diagnostic.
pub const FAILING_DOWNLOADER: &str =
    "#!/bin/sh\necho 'ERROR: [generic] Unable to download webpage: HTTP Error 404' >&2\nexit 1\n";

pub fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn binaries(downloader: &Path) -> BinariesConfig {
    BinariesConfig {
        ytdlp: downloader.to_string_lossy().into_owned(),
        ffmpeg: "false".to_string(),
        js_runtime: "node".to_string(),
    }
}

/// Three attempts, tiny backoff.
pub fn quick_queue_options() -> QueueOptions {
    QueueOptions {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
        poll_interval: Duration::from_millis(20),
        ..QueueOptions::default()
    }
}

pub async fn wait_terminal(queue: &JobQueue, id: JobId) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            let job = queue.get_job(id).await.unwrap().expect("job exists");
            if job.state.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job reached a terminal state")
}
