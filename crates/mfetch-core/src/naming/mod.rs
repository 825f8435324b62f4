//! Output file naming.
//!
//! Every file this system writes into the shared output directory is named
//! `<FILE_PREFIX><16 hex chars>.<ext>`. The prefix is what the sweeper and the
//! download resolver use to tell owned files from anything else in the
//! directory.

mod sanitize;

use rand::Rng;
use std::io;
use std::path::Path;

pub use sanitize::safe_download_name;

/// Namespace marker of files owned by mfetch.
pub const FILE_PREFIX: &str = "mfetch_";

/// Suffixes of files the downloader is still writing (or has abandoned).
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// Fresh output id: prefix + 8 random bytes as hex. Never derived from the URL.
pub fn new_file_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill(&mut bytes);
    format!("{FILE_PREFIX}{}", hex::encode(bytes))
}

/// True if `name` starts with `prefix` and has something after it. A prefix
/// appearing anywhere but the start does not count.
pub fn has_owner_prefix(name: &str, prefix: &str) -> bool {
    name.len() > prefix.len() && name.starts_with(prefix)
}

/// True if `name` is owned by mfetch.
pub fn is_owned_name(name: &str) -> bool {
    has_owner_prefix(name, FILE_PREFIX)
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Find the finished file produced for `file_id` in `dir`: `<file_id>.<ext>`,
/// ignoring partial/temporary files. With several candidates the
/// lexicographically first wins so the choice is stable.
pub async fn find_output_file(dir: &Path, file_id: &str) -> io::Result<Option<String>> {
    let stem = format!("{file_id}.");
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<String> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(&stem) && !is_partial(&name) {
            found.push(name);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_are_prefixed_hex_and_unique() {
        let a = new_file_id();
        let b = new_file_id();
        assert_ne!(a, b);
        let hex_part = a.strip_prefix(FILE_PREFIX).expect("prefixed");
        assert_eq!(hex_part.len(), 16);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_owned_name(&a));
    }

    #[test]
    fn ownership_requires_a_true_prefix() {
        assert!(is_owned_name("mfetch_0011aabbccddeeff.mp4"));
        assert!(!is_owned_name("video_mfetch_0011.mp4"));
        assert!(!is_owned_name("xmfetch_0011.mp4"));
        assert!(!is_owned_name("MFETCH_0011.mp4"));
        assert!(!is_owned_name("mfetch_"));
        assert!(!is_owned_name("notes.txt"));
    }

    #[test]
    fn owner_prefix_works_for_custom_prefixes() {
        assert!(has_owner_prefix("cache_1.webm", "cache_"));
        assert!(!has_owner_prefix("cache_", "cache_"));
        assert!(!has_owner_prefix("old_cache_1.webm", "cache_"));
        assert!(!has_owner_prefix("x_mfetch_a.mp4", FILE_PREFIX));
    }

    #[tokio::test]
    async fn finds_finished_output_and_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        let id = "mfetch_00112233aabbccdd";
        for name in [
            format!("{id}.mp4.part"),
            format!("{id}.mp4.ytdl"),
            format!("{id}.mp4"),
            "mfetch_ffffffffffffffff.mp4".to_string(),
            format!("{id}x.webm"),
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = find_output_file(dir.path(), id).await.unwrap();
        assert_eq!(found.as_deref(), Some("mfetch_00112233aabbccdd.mp4"));
    }

    #[tokio::test]
    async fn nothing_produced_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mfetch_aaaa.mp4.part"), b"x").unwrap();
        assert!(find_output_file(dir.path(), "mfetch_aaaa")
            .await
            .unwrap()
            .is_none());
    }
}
