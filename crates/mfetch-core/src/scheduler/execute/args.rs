//! Downloader command line for a job.

use std::path::Path;

use crate::queue::{JobParams, MediaKind};

/// Height limit if `quality` is a positive integer ("720"), None for "best"
/// and anything non-numeric.
fn height_limit(quality: &str) -> Option<u32> {
    quality.trim().parse::<u32>().ok().filter(|h| *h > 0)
}

/// Arguments for the downloader.
///
/// Every job gets exactly one item (`--no-playlist`), newline-terminated
/// progress (`--newline`), and no source mtime on the output (`--no-mtime`)
/// so the sweeper's age check sees the real creation time. The URL comes
/// after `--` so it is never parsed as an option.
pub fn download_args(params: &JobParams, output_template: &Path, js_runtime: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--js-runtimes".into(),
        js_runtime.into(),
        "--newline".into(),
        "--no-mtime".into(),
        "-o".into(),
        output_template.to_string_lossy().into_owned(),
    ];

    match params.kind {
        MediaKind::Audio | MediaKind::Mp3 => {
            args.extend(
                ["-x", "--audio-format", "mp3", "--audio-quality", "0"].map(String::from),
            );
        }
        MediaKind::Thumb => {
            args.extend(
                [
                    "--skip-download",
                    "--write-thumbnail",
                    "--convert-thumbnails",
                    "jpg",
                ]
                .map(String::from),
            );
        }
        MediaKind::Video => {
            let format = match height_limit(&params.quality) {
                Some(h) => format!("bv*[height<={h}]+ba/b[height<={h}]/b"),
                None => "bv*[ext=mp4]+ba[ext=m4a]/bv*+ba/b".to_string(),
            };
            args.extend([
                "-f".to_string(),
                format,
                "--merge-output-format".to_string(),
                "mp4".to_string(),
            ]);
        }
    }

    args.push("--".into());
    args.push(params.url.clone());
    args
}
