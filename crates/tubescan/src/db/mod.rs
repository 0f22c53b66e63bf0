//! SQLite-backed job store.
//!
//! Scan jobs, notifications and tab-read marks all live in one SQLite
//! file. A [`Database`] handle owns the connection behind an
//! `Arc<Mutex<..>>`; the repo modules (`job_repo`, `notification_repo`,
//! `tab_repo`) are free functions that borrow the handle and run their
//! statements through [`Database::with_conn`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod notification_repo;
pub mod tab_repo;

pub use error::StoreError;

/// Handle to the job store. Clones share one connection.
///
/// SQLite serializes writes internally, so funnelling everything through
/// one mutex-guarded connection costs little. WAL mode keeps readers
/// from blocking on the writer.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the store at `path`, creating the file and any missing parent
    /// directories, then brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Prepare {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        configure(&conn)?;
        migrations::run_all(&conn)?;

        log::info!("job store ready at {}", path.display());

        Ok(Self::wrap(conn))
    }

    /// In-memory store with the full schema applied, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self::wrap(conn))
    }

    /// Store location used when the config gives none:
    /// `~/.tubescan/data/tubescan.db`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tubescan").join("data").join("tubescan.db"))
    }

    /// Runs `f` with the connection lock held.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

/// Pragmas for file-backed stores. WAL for read concurrency, a busy
/// timeout so a second process gets SQLITE_BUSY only after waiting.
fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}
