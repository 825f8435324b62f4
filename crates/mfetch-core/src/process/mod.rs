//! External process runner.
//!
//! Spawns a tool with both output streams captured, scans every complete line
//! of either stream for progress markers as it arrives, and resolves on exit:
//! `Ok` only for exit status 0, otherwise a `ProcessError` carrying the exit
//! code and the collected diagnostic (stderr) text.

mod grammar;
mod lines;

use std::io;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::queue::Progress;

pub use grammar::{parse_progress_line, POSTPROCESS_PCT};
pub use lines::LineSplitter;

/// Diagnostic text kept per run; older output is dropped first.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// The external tool failed to launch or exited unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("process {program} exited with {}. Error: {stderr}", describe_exit(.code))]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

impl ProcessError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Exited { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured stderr of the failed run (empty for launch failures).
    pub fn diagnostics(&self) -> &str {
        match self {
            ProcessError::Exited { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// The child must not share (or pop up) the caller's console.
fn no_window(cmd: &mut Command) {
    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    let _ = cmd;
}

/// Run `program args...` to completion.
///
/// Progress parsed from either stream is sent on `progress_tx` in arrival
/// order. The call returns only after the process has exited, not merely
/// after its streams closed. Dropping the returned future leaves the child
/// running until it exits on its own.
pub async fn run(
    program: &str,
    args: &[String],
    progress_tx: Option<mpsc::Sender<Progress>>,
) -> Result<(), ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    no_window(&mut cmd);

    tracing::debug!(program, ?args, "spawning external process");
    let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
        program: program.to_string(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (_, diagnostics) = tokio::join!(
        pump(stdout, progress_tx.clone(), false),
        pump(stderr, progress_tx, true),
    );

    let status = child.wait().await.map_err(|source| ProcessError::Wait {
        program: program.to_string(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Exited {
            program: program.to_string(),
            code: status.code(),
            stderr: diagnostics,
        })
    }
}

/// Read one stream to EOF, forwarding progress markers. Returns the captured
/// text when `capture` is set.
async fn pump<R>(reader: Option<R>, tx: Option<mpsc::Sender<Progress>>, capture: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut splitter = LineSplitter::new();
    let mut captured: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("reading child output: {}", e);
                break;
            }
        };
        let chunk = &buf[..n];
        if capture {
            captured.extend_from_slice(chunk);
            if captured.len() > MAX_DIAGNOSTIC_BYTES {
                let excess = captured.len() - MAX_DIAGNOSTIC_BYTES;
                captured.drain(..excess);
            }
        }
        for line in splitter.push(chunk) {
            forward(&line, tx.as_ref()).await;
        }
    }
    if let Some(line) = splitter.finish() {
        forward(&line, tx.as_ref()).await;
    }

    String::from_utf8_lossy(&captured).into_owned()
}

async fn forward(line: &str, tx: Option<&mpsc::Sender<Progress>>) {
    if line.trim().is_empty() {
        return;
    }
    let (Some(tx), Some(progress)) = (tx, parse_progress_line(line)) else {
        return;
    };
    // A gone receiver only means nobody listens for progress any more.
    let _ = tx.send(progress).await;
}

#[cfg(all(test, unix))]
mod tests;
