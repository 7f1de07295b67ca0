//! Per-account database file discovery.

use std::path::{Path, PathBuf};

use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;

/// File name of an account database inside its account directory.
pub const DATABASE_FILE_NAME: &str = "database.sqlite";

/// Resolves account ids to database files under the app's data dir.
///
/// Layout: `<data_dir>/accounts/<account_id>/database.sqlite`.
#[derive(Debug, Clone)]
pub struct DatabaseLocator {
    data_dir: PathBuf,
}

impl DatabaseLocator {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Where the database for `account_id` lives, whether or not it exists.
    pub fn database_path(&self, account_id: DbId) -> PathBuf {
        self.data_dir
            .join("accounts")
            .join(account_id.to_string())
            .join(DATABASE_FILE_NAME)
    }

    /// Path of an existing database file for `account_id`.
    pub fn discover(&self, account_id: DbId) -> Result<PathBuf, ServiceError> {
        let path = self.database_path(account_id);
        if path.is_file() {
            Ok(path)
        } else {
            tracing::debug!(account_id, path = %path.display(), "Account database missing");
            Err(ServiceError::DatabaseNotFound { account_id })
        }
    }
}
