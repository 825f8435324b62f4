//! Best-effort AAC re-encode of finished mp4 files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::process;

/// Sibling the transcoder writes to. Ends in `.tmp` so output lookup never
/// mistakes it for a finished file; still carries the owner prefix so the
/// sweeper collects it if the process dies mid-way.
fn temp_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".aac.tmp");
    file.with_file_name(name)
}

fn transcode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Re-encode the audio track of `file` to AAC 192k with the moov atom up
/// front, replacing `file` in place. On error `file` is left untouched and
/// the temporary output is removed.
pub async fn reencode_audio_aac(ffmpeg: &str, file: &Path) -> Result<()> {
    let tmp = temp_path(file);
    let args = transcode_args(file, &tmp);

    let converted = async {
        process::run(ffmpeg, &args, None).await?;
        tokio::fs::rename(&tmp, file)
            .await
            .with_context(|| format!("replace {} with transcoded output", file.display()))?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if converted.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    converted
}
