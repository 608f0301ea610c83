//! Persistence layer for completed engagement sessions: a small SQLite
//! store for the local session log, plus the CSV backup writer used when
//! an upload to the collector fails.

use std::env;
use std::path::PathBuf;

pub mod backup;
pub mod error;
pub mod schema;
pub mod store;

pub use backup::append_csv_backup;
pub use error::{Result, StoreError};
pub use store::{Store, StoredSession};

/// Base directory for all local ses data. `SES_DATA_DIR` overrides the
/// default `~/.ses`.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = env::var("SES_DATA_DIR") {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".ses")
}
