use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use ses_core::SessionSummary;

const UPLOAD_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// POST the session summary to the collector, retrying transient failures
/// with a short backoff. After the final failure the summary is appended to
/// the local CSV backup and `Ok(false)` is returned; only the backup itself
/// failing is an error.
pub async fn post_summary(
    endpoint: &str,
    summary: &SessionSummary,
    backup_path: &Path,
) -> Result<bool> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    for attempt in 1..=UPLOAD_ATTEMPTS {
        match client.post(endpoint).json(summary).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => {
                    tracing::info!(status = %response.status(), "summary uploaded");
                    return Ok(true);
                }
                Err(e) => tracing::warn!("upload attempt {attempt} rejected: {e}"),
            },
            Err(e) => tracing::warn!("upload attempt {attempt} failed: {e}"),
        }
        if attempt < UPLOAD_ATTEMPTS {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    tracing::error!("upload failed after {UPLOAD_ATTEMPTS} attempts, saving locally");
    ses_store::append_csv_backup(backup_path, summary)?;
    Ok(false)
}
