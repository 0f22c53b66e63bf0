//! Job repository — CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, StoreError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub status: String,
    pub progress: u8,
    pub current_step: Option<String>,
    pub current_step_index: u32,
    pub total_steps: u32,
    pub priority: String,
    pub is_own_video: bool,
    pub include_transcript: bool,
    pub include_ai: bool,
    pub include_multimodal: bool,
    pub result_id: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub archived: bool,
    pub archived_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            video_id: row.get("video_id")?,
            url: row.get("url")?,
            title: row.get("title")?,
            thumbnail: row.get("thumbnail")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            current_step: row.get("current_step")?,
            current_step_index: row.get("current_step_index")?,
            total_steps: row.get("total_steps")?,
            priority: row.get("priority")?,
            is_own_video: row.get("is_own_video")?,
            include_transcript: row.get("include_transcript")?,
            include_ai: row.get("include_ai")?,
            include_multimodal: row.get("include_multimodal")?,
            result_id: row.get("result_id")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            archived: row.get("archived")?,
            archived_at: row.get("archived_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub exclude_archived: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Outcome of a guarded insert.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The row was inserted.
    Created,
    /// An active (pending or processing) job for the same user and video
    /// already exists; no row was inserted.
    Duplicate(JobRow),
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), StoreError> {
    db.with_conn(|conn| insert_inner(conn, job))
}

fn insert_inner(conn: &rusqlite::Connection, job: &JobRow) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO jobs (id, user_id, video_id, url, title, thumbnail, status, progress,
         current_step, current_step_index, total_steps, priority, is_own_video,
         include_transcript, include_ai, include_multimodal, result_id, error,
         created_at, started_at, completed_at, archived, archived_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        params![
            job.id,
            job.user_id,
            job.video_id,
            job.url,
            job.title,
            job.thumbnail,
            job.status,
            job.progress,
            job.current_step,
            job.current_step_index,
            job.total_steps,
            job.priority,
            job.is_own_video,
            job.include_transcript,
            job.include_ai,
            job.include_multimodal,
            job.result_id,
            job.error,
            job.created_at,
            job.started_at,
            job.completed_at,
            job.archived,
            job.archived_at,
        ],
    )?;
    Ok(())
}

/// Inserts a new job row unless an active job for the same `(user_id, video_id)`
/// pair already exists.
///
/// The duplicate check and the insert run under a single connection lock,
/// which narrows (but does not eliminate, across processes) the
/// check-then-act window.
pub fn insert_unless_active(db: &Database, job: &JobRow) -> Result<InsertOutcome, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE user_id = ?1 AND video_id = ?2
             AND status IN ('pending', 'processing') LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![job.user_id, job.video_id], JobRow::from_row)?;
        if let Some(existing) = rows.next() {
            return Ok(InsertOutcome::Duplicate(existing?));
        }
        drop(rows);
        drop(stmt);

        insert_inner(conn, job)?;
        Ok(InsertOutcome::Created)
    })
}

/// Rewrites a job row wholesale. All fields except `id`, `user_id` and
/// `created_at` are overwritten, with no status guard. Lifecycle code
/// goes through [`update_in_flight`] instead; this is for maintenance
/// paths and fixtures that need to edit timestamps directly.
pub fn update(db: &Database, job: &JobRow) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET video_id=?2, url=?3, title=?4, thumbnail=?5, status=?6,
             progress=?7, current_step=?8, current_step_index=?9, total_steps=?10,
             priority=?11, is_own_video=?12, include_transcript=?13, include_ai=?14,
             include_multimodal=?15, result_id=?16, error=?17, started_at=?18,
             completed_at=?19, archived=?20, archived_at=?21
             WHERE id=?1",
            params![
                job.id,
                job.video_id,
                job.url,
                job.title,
                job.thumbnail,
                job.status,
                job.progress,
                job.current_step,
                job.current_step_index,
                job.total_steps,
                job.priority,
                job.is_own_video,
                job.include_transcript,
                job.include_ai,
                job.include_multimodal,
                job.result_id,
                job.error,
                job.started_at,
                job.completed_at,
                job.archived,
                job.archived_at,
            ],
        )?;
        Ok(())
    })
}

/// Writes a lifecycle update to a job, but only while it is still active.
///
/// The status guard and the write are a single statement, so a job that
/// reached a terminal state after the caller's read is left untouched and
/// `false` comes back. `progress` can only grow and `started_at` keeps its
/// first stamp, even when the caller's snapshot is stale.
pub fn update_in_flight(db: &Database, job: &JobRow) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status=?2, progress=MAX(progress, ?3), current_step=?4,
             current_step_index=?5, title=?6, thumbnail=?7, result_id=?8, error=?9,
             started_at=COALESCE(started_at, ?10), completed_at=?11
             WHERE id=?1 AND status IN ('pending', 'processing')",
            params![
                job.id,
                job.status,
                job.progress,
                job.current_step,
                job.current_step_index,
                job.title,
                job.thumbnail,
                job.result_id,
                job.error,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(StoreError::Backend(e)),
            None => Ok(None),
        }
    })
}

/// Finds an active (pending or processing) job for a user/video pair.
pub fn find_active_for_video(
    db: &Database,
    user_id: &str,
    video_id: &str,
) -> Result<Option<JobRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE user_id = ?1 AND video_id = ?2
             AND status IN ('pending', 'processing') LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![user_id, video_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(StoreError::Backend(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), StoreError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref user_id) = filter.user_id {
            conditions.push(format!("user_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(user_id.clone()));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if filter.exclude_archived {
            conditions.push("archived = 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Returns all pending jobs. Ordering is left to the caller: selection
/// policy (priority, then FIFO) is applied in memory rather than relying
/// on store-side ordering.
pub fn list_pending(db: &Database) -> Result<Vec<JobRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE status = 'pending'")?;
        let rows: Vec<JobRow> = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Atomically claims a pending job for processing.
///
/// Returns `true` if this caller won the claim. `started_at` is stamped
/// only if the job has never started before.
pub fn try_claim(db: &Database, id: &str, started_at: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing',
             started_at = COALESCE(started_at, ?2)
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at],
        )?;
        Ok(changed == 1)
    })
}

/// Counts jobs currently in `processing`, either globally or for one user.
pub fn count_processing(db: &Database, user_id: Option<&str>) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let count: u64 = match user_id {
            Some(user) => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = 'processing' AND user_id = ?1",
                params![user],
                |r| r.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = 'processing'",
                [],
                |r| r.get(0),
            )?,
        };
        Ok(count)
    })
}

/// Returns per-status job counts for a user as `(status, count)` pairs.
pub fn status_counts_for_user(
    db: &Database,
    user_id: &str,
    exclude_archived: bool,
) -> Result<Vec<(String, u64)>, StoreError> {
    db.with_conn(|conn| {
        let sql = if exclude_archived {
            "SELECT status, COUNT(*) FROM jobs
             WHERE user_id = ?1 AND archived = 0 GROUP BY status"
        } else {
            "SELECT status, COUNT(*) FROM jobs WHERE user_id = ?1 GROUP BY status"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows: Vec<(String, u64)> = stmt
            .query_map(params![user_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Hard-deletes a job row. Returns `true` if a row was deleted.
pub fn delete(db: &Database, id: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}

/// Batch-archives terminal jobs owned by `user_id` in a single statement.
///
/// Jobs not owned by the caller, non-terminal jobs and already-archived
/// jobs are skipped. Returns the number of rows newly archived, which
/// makes re-archiving idempotent (second call reports 0).
pub fn archive_batch(
    db: &Database,
    user_id: &str,
    job_ids: &[String],
    archived_at: &str,
) -> Result<u64, StoreError> {
    if job_ids.is_empty() {
        return Ok(0);
    }

    db.with_conn(|conn| {
        let placeholders: Vec<String> = (3..3 + job_ids.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "UPDATE jobs SET archived = 1, archived_at = ?2
             WHERE user_id = ?1 AND archived = 0
             AND status IN ('completed', 'failed', 'cancelled')
             AND id IN ({})",
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(user_id.to_string()));
        param_values.push(Box::new(archived_at.to_string()));
        for id in job_ids {
            param_values.push(Box::new(id.clone()));
        }
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let changed = conn.execute(&sql, params_ref.as_slice())?;
        Ok(changed as u64)
    })
}

/// Deletes completed jobs whose `completed_at` is older than `cutoff`,
/// optionally scoped to one user. Returns the number of rows deleted.
pub fn delete_completed_before(
    db: &Database,
    cutoff: &str,
    user_id: Option<&str>,
) -> Result<u64, StoreError> {
    db.with_conn(|conn| {
        let changed = match user_id {
            Some(user) => conn.execute(
                "DELETE FROM jobs WHERE status = 'completed'
                 AND completed_at IS NOT NULL AND completed_at < ?1 AND user_id = ?2",
                params![cutoff, user],
            )?,
            None => conn.execute(
                "DELETE FROM jobs WHERE status = 'completed'
                 AND completed_at IS NOT NULL AND completed_at < ?1",
                params![cutoff],
            )?,
        };
        Ok(changed as u64)
    })
}

/// Returns processing jobs whose `started_at` is older than `cutoff`.
/// These are candidates for stale-job recovery after a worker crash.
pub fn find_stale_processing(db: &Database, cutoff: &str) -> Result<Vec<JobRow>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = 'processing'
             AND started_at IS NOT NULL AND started_at < ?1",
        )?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![cutoff], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    pub(crate) fn sample_job(id: &str, user: &str, video: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            user_id: user.to_string(),
            video_id: video.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", video),
            title: Some("Test video".to_string()),
            thumbnail: None,
            status: "pending".to_string(),
            progress: 0,
            current_step: None,
            current_step_index: 0,
            total_steps: 5,
            priority: "normal".to_string(),
            is_own_video: false,
            include_transcript: true,
            include_ai: true,
            include_multimodal: false,
            result_id: None,
            error: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            started_at: None,
            completed_at: None,
            archived: false,
            archived_at: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("job-1", "u1", "dQw4w9WgXcQ")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.user_id, "u1");
        assert_eq!(found.video_id, "dQw4w9WgXcQ");
        assert_eq!(found.status, "pending");
        assert_eq!(found.total_steps, 5);
        assert!(!found.archived);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_insert_unless_active_blocks_duplicate() {
        let db = test_db();
        insert(&db, &sample_job("a1", "u1", "dQw4w9WgXcQ")).unwrap();

        let outcome =
            insert_unless_active(&db, &sample_job("a2", "u1", "dQw4w9WgXcQ")).unwrap();
        match outcome {
            InsertOutcome::Duplicate(existing) => assert_eq!(existing.id, "a1"),
            InsertOutcome::Created => panic!("expected duplicate"),
        }

        // Only the first row exists.
        assert!(find_by_id(&db, "a2").unwrap().is_none());
    }

    #[test]
    fn test_insert_unless_active_allows_after_terminal() {
        let db = test_db();
        let mut done = sample_job("t1", "u1", "dQw4w9WgXcQ");
        done.status = "completed".to_string();
        done.completed_at = Some("2026-01-01T01:00:00+00:00".to_string());
        insert(&db, &done).unwrap();

        let outcome =
            insert_unless_active(&db, &sample_job("t2", "u1", "dQw4w9WgXcQ")).unwrap();
        assert!(matches!(outcome, InsertOutcome::Created));
    }

    #[test]
    fn test_update() {
        let db = test_db();
        let mut job = sample_job("job-2", "u1", "abcdefghijk");
        insert(&db, &job).unwrap();

        job.status = "completed".to_string();
        job.progress = 100;
        job.result_id = Some("result-9".to_string());
        job.completed_at = Some("2026-01-01T01:00:00+00:00".to_string());
        update(&db, &job).unwrap();

        let found = find_by_id(&db, "job-2").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.progress, 100);
        assert_eq!(found.result_id.as_deref(), Some("result-9"));
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_update_in_flight_refuses_terminal_row() {
        let db = test_db();
        let mut job = sample_job("job-10", "u1", "abcdefghijk");
        insert(&db, &job).unwrap();

        // Snapshot taken while the row is pending.
        let mut stale = job.clone();

        job.status = "cancelled".to_string();
        job.completed_at = Some("2026-01-01T01:00:00+00:00".to_string());
        update(&db, &job).unwrap();

        // A writer still holding the pending snapshot cannot bring the
        // row back to life.
        stale.status = "processing".to_string();
        stale.progress = 20;
        stale.started_at = Some("2026-01-01T02:00:00+00:00".to_string());
        assert!(!update_in_flight(&db, &stale).unwrap());

        let found = find_by_id(&db, "job-10").unwrap().unwrap();
        assert_eq!(found.status, "cancelled");
        assert_eq!(found.progress, 0);
        assert!(found.started_at.is_none());
    }

    #[test]
    fn test_update_in_flight_keeps_stored_floors() {
        let db = test_db();
        let mut job = sample_job("job-11", "u1", "abcdefghijk");
        insert(&db, &job).unwrap();

        job.status = "processing".to_string();
        job.progress = 60;
        job.started_at = Some("2026-01-01T00:10:00+00:00".to_string());
        assert!(update_in_flight(&db, &job).unwrap());

        // A stale snapshot lands, but cannot lower progress or re-stamp
        // the start time.
        let mut stale = job.clone();
        stale.progress = 40;
        stale.started_at = Some("2026-01-01T00:30:00+00:00".to_string());
        stale.current_step = Some("ai_analysis".to_string());
        assert!(update_in_flight(&db, &stale).unwrap());

        let found = find_by_id(&db, "job-11").unwrap().unwrap();
        assert_eq!(found.progress, 60);
        assert_eq!(
            found.started_at.as_deref(),
            Some("2026-01-01T00:10:00+00:00")
        );
        assert_eq!(found.current_step.as_deref(), Some("ai_analysis"));
    }

    #[test]
    fn test_query_with_user_and_status_filter() {
        let db = test_db();
        insert(&db, &sample_job("q1", "u1", "aaaaaaaaaaa")).unwrap();
        insert(&db, &sample_job("q2", "u2", "bbbbbbbbbbb")).unwrap();

        let mut completed = sample_job("q3", "u1", "ccccccccccc");
        completed.status = "completed".to_string();
        insert(&db, &completed).unwrap();

        let (rows, total) = query(
            &db,
            &JobFilter {
                user_id: Some("u1".to_string()),
                status: Some("pending".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "q1");
    }

    #[test]
    fn test_query_excludes_archived() {
        let db = test_db();
        insert(&db, &sample_job("v1", "u1", "aaaaaaaaaaa")).unwrap();

        let mut archived = sample_job("v2", "u1", "bbbbbbbbbbb");
        archived.status = "completed".to_string();
        archived.archived = true;
        archived.archived_at = Some("2026-01-02T00:00:00+00:00".to_string());
        insert(&db, &archived).unwrap();

        let (rows, total) = query(
            &db,
            &JobFilter {
                user_id: Some("u1".to_string()),
                exclude_archived: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "v1");
    }

    #[test]
    fn test_query_pagination() {
        let db = test_db();
        for i in 0..10 {
            let mut job = sample_job(&format!("p{}", i), "u1", "aaaaaaaaaaa");
            job.status = "completed".to_string();
            job.created_at = format!("2026-01-{:02}T00:00:00+00:00", i + 1);
            insert(&db, &job).unwrap();
        }

        let (rows, total) = query(
            &db,
            &JobFilter {
                limit: Some(3),
                offset: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        // Newest first.
        assert_eq!(rows[0].id, "p9");
    }

    #[test]
    fn test_try_claim_races_only_one_winner() {
        let db = test_db();
        insert(&db, &sample_job("c1", "u1", "aaaaaaaaaaa")).unwrap();

        assert!(try_claim(&db, "c1", "2026-01-01T00:01:00+00:00").unwrap());
        // Second claim loses: the row is no longer pending.
        assert!(!try_claim(&db, "c1", "2026-01-01T00:02:00+00:00").unwrap());

        let row = find_by_id(&db, "c1").unwrap().unwrap();
        assert_eq!(row.status, "processing");
        assert_eq!(row.started_at.as_deref(), Some("2026-01-01T00:01:00+00:00"));
    }

    #[test]
    fn test_count_processing() {
        let db = test_db();
        for (id, user) in [("w1", "u1"), ("w2", "u1"), ("w3", "u2")] {
            let mut job = sample_job(id, user, "aaaaaaaaaaa");
            job.video_id = id.repeat(4).chars().take(11).collect();
            job.status = "processing".to_string();
            insert(&db, &job).unwrap();
        }

        assert_eq!(count_processing(&db, None).unwrap(), 3);
        assert_eq!(count_processing(&db, Some("u1")).unwrap(), 2);
        assert_eq!(count_processing(&db, Some("u3")).unwrap(), 0);
    }

    #[test]
    fn test_archive_batch_idempotent() {
        let db = test_db();
        let mut done = sample_job("ar1", "u1", "aaaaaaaaaaa");
        done.status = "completed".to_string();
        insert(&db, &done).unwrap();

        let ids = vec!["ar1".to_string()];
        assert_eq!(
            archive_batch(&db, "u1", &ids, "2026-01-02T00:00:00+00:00").unwrap(),
            1
        );
        // Second call archives nothing and must not re-stamp archived_at.
        assert_eq!(
            archive_batch(&db, "u1", &ids, "2026-01-03T00:00:00+00:00").unwrap(),
            0
        );

        let row = find_by_id(&db, "ar1").unwrap().unwrap();
        assert!(row.archived);
        assert_eq!(row.archived_at.as_deref(), Some("2026-01-02T00:00:00+00:00"));
    }

    #[test]
    fn test_archive_batch_skips_foreign_and_nonterminal() {
        let db = test_db();
        insert(&db, &sample_job("ar2", "u1", "aaaaaaaaaaa")).unwrap(); // pending

        let mut other = sample_job("ar3", "u2", "bbbbbbbbbbb");
        other.status = "completed".to_string();
        insert(&db, &other).unwrap();

        let ids = vec!["ar2".to_string(), "ar3".to_string()];
        assert_eq!(
            archive_batch(&db, "u1", &ids, "2026-01-02T00:00:00+00:00").unwrap(),
            0
        );
    }

    #[test]
    fn test_delete_completed_before() {
        let db = test_db();
        let mut old = sample_job("d1", "u1", "aaaaaaaaaaa");
        old.status = "completed".to_string();
        old.completed_at = Some("2026-01-01T00:00:00+00:00".to_string());
        insert(&db, &old).unwrap();

        let mut recent = sample_job("d2", "u1", "bbbbbbbbbbb");
        recent.status = "completed".to_string();
        recent.completed_at = Some("2026-01-08T00:00:00+00:00".to_string());
        insert(&db, &recent).unwrap();

        let deleted =
            delete_completed_before(&db, "2026-01-03T00:00:00+00:00", None).unwrap();
        assert_eq!(deleted, 1);
        assert!(find_by_id(&db, "d1").unwrap().is_none());
        assert!(find_by_id(&db, "d2").unwrap().is_some());
    }

    #[test]
    fn test_find_stale_processing() {
        let db = test_db();
        let mut stale = sample_job("s1", "u1", "aaaaaaaaaaa");
        stale.status = "processing".to_string();
        stale.started_at = Some("2026-01-01T00:00:00+00:00".to_string());
        insert(&db, &stale).unwrap();

        let mut fresh = sample_job("s2", "u1", "bbbbbbbbbbb");
        fresh.status = "processing".to_string();
        fresh.started_at = Some("2026-01-01T02:00:00+00:00".to_string());
        insert(&db, &fresh).unwrap();

        let rows = find_stale_processing(&db, "2026-01-01T01:00:00+00:00").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "s1");
    }
}
