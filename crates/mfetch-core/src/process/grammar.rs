//! Progress markers in the downloader's text output.

use regex::Regex;
use std::sync::OnceLock;

use crate::queue::{Phase, Progress};

/// Percentage reported for post-download steps the tool does not quantify.
pub const POSTPROCESS_PCT: f64 = 99.0;

fn download_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // [download]  45.5% of ~10.00MiB at  2.50MiB/s ETA 00:05 (frag 3/20)
        Regex::new(
            r"\[download\]\s+(\d+(?:\.\d+)?)%(?:.*?\bat\s+(\S+))?(?:.*?\bETA\s+(\S+))?",
        )
        .expect("static regex")
    })
}

/// Parse one output line. Unrecognized lines yield None.
pub fn parse_progress_line(line: &str) -> Option<Progress> {
    if let Some(caps) = download_re().captures(line) {
        let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
        let mut progress = Progress::new(pct, Phase::Download);
        progress.speed = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.starts_with("Unknown"));
        progress.eta = caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.starts_with("Unknown"));
        return Some(progress);
    }
    if line.contains("[ExtractAudio]") {
        return Some(Progress::new(POSTPROCESS_PCT, Phase::Convert));
    }
    if line.contains("[Merger]") {
        return Some(Progress::new(POSTPROCESS_PCT, Phase::Merge));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_line_with_speed_and_eta() {
        let p = parse_progress_line("[download]  45.5% of 10.00MiB at 2.50MiB/s ETA 00:05")
            .expect("progress");
        assert_eq!(p.pct, 45.5);
        assert_eq!(p.phase, Phase::Download);
        assert_eq!(p.speed.as_deref(), Some("2.50MiB/s"));
        assert_eq!(p.eta.as_deref(), Some("00:05"));
    }

    #[test]
    fn download_complete_line() {
        let p = parse_progress_line("[download] 100% of 10.00MiB in 00:00:04 at 2.31MiB/s")
            .expect("progress");
        assert_eq!(p.pct, 100.0);
        assert!(p.is_complete());
        assert!(p.eta.is_none());
    }

    #[test]
    fn unknown_speed_is_dropped() {
        let p = parse_progress_line("[download]   0.0% of 3.2MiB at Unknown B/s ETA Unknown")
            .expect("progress");
        assert_eq!(p.pct, 0.0);
        assert!(p.speed.is_none());
        assert!(p.eta.is_none());
    }

    #[test]
    fn postprocess_markers() {
        let merge = parse_progress_line("[Merger] Merging formats into \"x.mp4\"").unwrap();
        assert_eq!(merge.phase, Phase::Merge);
        assert_eq!(merge.pct, POSTPROCESS_PCT);
        let convert = parse_progress_line("[ExtractAudio] Destination: x.mp3").unwrap();
        assert_eq!(convert.phase, Phase::Convert);
    }

    #[test]
    fn other_lines_are_ignored() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("[download] Destination: x.webm").is_none());
        assert!(parse_progress_line("").is_none());
    }
}
