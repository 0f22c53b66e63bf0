//! Notification repository — persisted completion/failure notices.

use rusqlite::{params, Row};

use super::{Database, StoreError};

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub job_id: String,
    pub result_id: Option<String>,
    pub title: Option<String>,
    pub video_id: String,
    pub event_type: String,
    pub is_read: bool,
    pub created_at: String,
}

impl NotificationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            job_id: row.get("job_id")?,
            result_id: row.get("result_id")?,
            title: row.get("title")?,
            video_id: row.get("video_id")?,
            event_type: row.get("event_type")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, notification: &NotificationRow) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO notifications (id, user_id, job_id, result_id, title, video_id,
             event_type, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                notification.id,
                notification.user_id,
                notification.job_id,
                notification.result_id,
                notification.title,
                notification.video_id,
                notification.event_type,
                notification.is_read,
                notification.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists a user's notifications, newest first.
pub fn list_for_user(
    db: &Database,
    user_id: &str,
    limit: u64,
) -> Result<Vec<NotificationRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM notifications WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows: Vec<NotificationRow> = stmt
            .query_map(params![user_id, limit as i64], NotificationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn count_unread(db: &Database, user_id: &str) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Marks a single notification as read. Scoped to the owning user so a
/// caller cannot flip another user's rows. Returns `true` if a row changed.
pub fn mark_read(db: &Database, user_id: &str, id: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed == 1)
    })
}

/// Marks all of a user's notifications as read. Returns the number updated.
pub fn mark_all_read(db: &Database, user_id: &str) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            params![user_id],
        )?;
        Ok(changed as u64)
    })
}

/// Deletes notifications older than `cutoff`. Used by the retention sweep.
pub fn delete_before(db: &Database, cutoff: &str) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "DELETE FROM notifications WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(changed as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample(id: &str, user: &str, created_at: &str) -> NotificationRow {
        NotificationRow {
            id: id.to_string(),
            user_id: user.to_string(),
            job_id: format!("job-{}", id),
            result_id: Some(format!("result-{}", id)),
            title: Some("Test video".to_string()),
            video_id: "dQw4w9WgXcQ".to_string(),
            event_type: "completed".to_string(),
            is_read: false,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = test_db();
        insert(&db, &sample("n1", "u1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n2", "u1", "2026-01-02T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n3", "u2", "2026-01-03T00:00:00+00:00")).unwrap();

        let rows = list_for_user(&db, "u1", 50).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "n2");
        assert_eq!(rows[1].id, "n1");
    }

    #[test]
    fn test_unread_and_mark_read() {
        let db = test_db();
        insert(&db, &sample("n1", "u1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n2", "u1", "2026-01-02T00:00:00+00:00")).unwrap();

        assert_eq!(count_unread(&db, "u1").unwrap(), 2);
        assert!(mark_read(&db, "u1", "n1").unwrap());
        assert_eq!(count_unread(&db, "u1").unwrap(), 1);

        // Wrong owner does nothing.
        assert!(!mark_read(&db, "u2", "n2").unwrap());
        assert_eq!(count_unread(&db, "u1").unwrap(), 1);
    }

    #[test]
    fn test_mark_all_read() {
        let db = test_db();
        insert(&db, &sample("n1", "u1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n2", "u1", "2026-01-02T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n3", "u2", "2026-01-03T00:00:00+00:00")).unwrap();

        assert_eq!(mark_all_read(&db, "u1").unwrap(), 2);
        assert_eq!(count_unread(&db, "u1").unwrap(), 0);
        assert_eq!(count_unread(&db, "u2").unwrap(), 1);
    }

    #[test]
    fn test_delete_before() {
        let db = test_db();
        insert(&db, &sample("n1", "u1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("n2", "u1", "2026-01-09T00:00:00+00:00")).unwrap();

        assert_eq!(delete_before(&db, "2026-01-05T00:00:00+00:00").unwrap(), 1);
        let rows = list_for_user(&db, "u1", 50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "n2");
    }
}
