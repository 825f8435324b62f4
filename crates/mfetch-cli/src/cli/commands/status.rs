//! `mfetch status <id>` – one job as JSON.

use anyhow::Result;
use mfetch_core::service::MediaService;

pub async fn run_status(service: &MediaService, id: i64) -> Result<()> {
    let view = service.status(id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
