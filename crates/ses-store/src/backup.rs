use std::fs::OpenOptions;
use std::path::Path;

use ses_core::SessionSummary;

use crate::error::Result;

/// Append a summary row to the local CSV backup file, creating it (with a
/// header) on first use. This is the fallback when uploading to the
/// collector fails; rows accumulate across sessions.
pub fn append_csv_backup(path: &Path, summary: &SessionSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let new_file = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(new_file)
        .from_writer(file);
    writer.serialize(summary)?;
    writer.flush()?;

    tracing::info!("appended session backup to {}", path.display());
    Ok(())
}
