//! `mfetch submit <url>` – queue a download.

use anyhow::Result;
use mfetch_core::service::MediaService;

pub async fn run_submit(
    service: &MediaService,
    url: &str,
    kind: Option<&str>,
    quality: Option<&str>,
) -> Result<()> {
    let id = service.submit(url, kind, quality).await?;
    println!("{}", serde_json::json!({ "jobId": id }));
    Ok(())
}
