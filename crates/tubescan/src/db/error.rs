//! Failure modes of the on-disk job store.

use std::path::PathBuf;
use thiserror::Error;

/// Anything that can go wrong while talking to the job store.
///
/// Most failures surface as [`StoreError::Backend`] straight from rusqlite;
/// the remaining variants cover the few things that break before a statement
/// ever runs: preparing the store directory, upgrading the schema, or a
/// thread panicking while it held the connection lock.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A statement or query failed inside SQLite.
    #[error("sqlite: {0}")]
    Backend(#[from] rusqlite::Error),

    /// The directory holding the store file could not be created.
    #[error("cannot prepare store directory {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema upgrade step did not apply cleanly.
    #[error("schema upgrade v{version} failed: {reason}")]
    Schema { version: u32, reason: String },

    /// A thread panicked while holding the connection lock.
    #[error("job store connection lock poisoned")]
    Poisoned,
}
