//! Tab read-state repository.
//!
//! Tracks when a user last viewed a dashboard tab, so badge counts can be
//! computed as "jobs finished since last look".

use rusqlite::params;

use super::{Database, StoreError};

/// Records that `user_id` viewed `tab_name` at `read_at` (RFC 3339).
pub fn mark_read(
    db: &Database,
    user_id: &str,
    tab_name: &str,
    read_at: &str,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tab_reads (user_id, tab_name, last_read_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, tab_name) DO UPDATE SET last_read_at = excluded.last_read_at",
            params![user_id, tab_name, read_at],
        )?;
        Ok(())
    })
}

/// Returns when `user_id` last viewed `tab_name`, if ever.
pub fn last_read_at(
    db: &Database,
    user_id: &str,
    tab_name: &str,
) -> Result<Option<String>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT last_read_at FROM tab_reads WHERE user_id = ?1 AND tab_name = ?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, tab_name], |r| r.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(ts)) => Ok(Some(ts)),
            Some(Err(e)) => Err(StoreError::Backend(e)),
            None => Ok(None),
        }
    })
}
