//! `mfetch sweep` – one retention pass over the output directory.

use anyhow::Result;
use mfetch_core::config::MfetchConfig;
use mfetch_core::naming::FILE_PREFIX;
use mfetch_core::sweeper::sweep_once;
use std::time::SystemTime;

pub async fn run_sweep(cfg: &MfetchConfig) -> Result<()> {
    let report = sweep_once(
        &cfg.download_dir,
        FILE_PREFIX,
        cfg.file_ttl(),
        SystemTime::now(),
    )
    .await;
    println!(
        "Swept {}: {} file(s) deleted, {} error(s)",
        cfg.download_dir.display(),
        report.deleted,
        report.errors
    );
    Ok(())
}
