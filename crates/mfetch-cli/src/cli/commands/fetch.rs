//! `mfetch fetch <name>` – copy a finished file out of the output directory.

use anyhow::{Context, Result};
use mfetch_core::service::MediaService;
use std::path::{Path, PathBuf};

/// Where the copy lands: `dest` itself, or `dest/<name>` when `dest` is a directory.
async fn target_path(dest: Option<&Path>, name: &str) -> Result<PathBuf> {
    let dest = match dest {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir()?,
    };
    match tokio::fs::metadata(&dest).await {
        Ok(meta) if meta.is_dir() => Ok(dest.join(name)),
        _ => Ok(dest),
    }
}

pub async fn run_fetch(service: &MediaService, name: &str, dest: Option<&Path>) -> Result<()> {
    let source = service.resolve_download(name).await?;
    let target = target_path(dest, name).await?;
    let bytes = tokio::fs::copy(&source, &target)
        .await
        .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;
    println!("Saved {} ({} bytes)", target.display(), bytes);
    Ok(())
}
