#![forbid(unsafe_code)]

mod changes;
mod error;
mod schema;
mod tickets;
mod timeline;

pub use changes::{ChangeKind, ChangeRow, ChangeTable};
pub use error::StoreError;
pub use timeline::FieldSet;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "solar_timeline.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// One connection to the timeline database. Open one store per caller; handles on the same
/// directory share the database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(storage_dir, &StoreOptions::default())
    }

    pub fn open_with(
        storage_dir: impl AsRef<Path>,
        options: &StoreOptions,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(options.busy_timeout)?;
        schema::install(&conn)?;

        tracing::debug!(path = %db_path.display(), "opened timeline store");
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}
