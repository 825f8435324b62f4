//! Runner tests driving `sh` as the external tool.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{run, ProcessError};
use crate::queue::Phase;

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn success_streams_progress_from_both_streams() {
    let (tx, mut rx) = mpsc::channel(64);
    let script = r#"
        printf '[youtube] abc: Downloading webpage\n'
        printf '[download]  10.0%% of 1.00MiB at 1.00MiB/s ETA 00:01\n'
        printf '[download]  55.0%% of 1.00MiB'
        printf ' at 1.00MiB/s ETA 00:00\r'
        printf '[download] 100%% of 1.00MiB\n' 1>&2
        printf '[Merger] Merging formats'
    "#;
    run("sh", &sh(script), Some(tx)).await.expect("exit 0");

    let mut seen = Vec::new();
    while let Ok(p) = rx.try_recv() {
        seen.push(p);
    }
    let download: Vec<f64> = seen
        .iter()
        .filter(|p| p.phase == Phase::Download)
        .map(|p| p.pct)
        .collect();
    assert!(download.contains(&10.0));
    assert!(download.contains(&55.0), "partial line must be joined");
    assert!(download.contains(&100.0), "stderr is scanned too");
    assert!(
        seen.iter().any(|p| p.phase == Phase::Merge),
        "unterminated final line is not discarded"
    );
}

#[tokio::test]
async fn nonzero_exit_carries_code_and_diagnostics() {
    let err = run("sh", &sh("echo 'ERROR: [generic] Unsupported URL' >&2; exit 3"), None)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    assert!(err.diagnostics().contains("Unsupported URL"));
    let msg = err.to_string();
    assert!(msg.contains("code 3"), "{msg}");
    assert!(msg.contains("ERROR: [generic] Unsupported URL"), "{msg}");
}

#[tokio::test]
async fn missing_binary_is_a_launch_error() {
    let err = run("/nonexistent/mfetch-test-tool", &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Launch { .. }));
    assert_eq!(err.exit_code(), None);
}

#[tokio::test]
async fn waits_for_exit_after_streams_close() {
    let started = Instant::now();
    run("sh", &sh("exec >&- 2>&-; sleep 0.3; exit 0"), None)
        .await
        .expect("exit 0");
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn dropped_receiver_does_not_fail_the_run() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    run("sh", &sh("printf '[download] 1%% of 1MiB\n[download] 2%% of 1MiB\n'"), Some(tx))
        .await
        .expect("exit 0");
}
