//! Job lifecycle manager.
//!
//! Sole authority for constructing and mutating job records. All status
//! transitions, progress clamping and timestamp stamping happen here;
//! callers and workers never write rows directly.

use chrono::Utc;
use uuid::Uuid;

use crate::db::job_repo::{self, InsertOutcome, JobRow};
use crate::db::Database;
use crate::error::TubescanError;
use crate::queue::dedup;
use crate::queue::job::{AnalysisOptions, JobPriority, JobStatus, JobUpdate, ScanJob, TOTAL_STEPS};
use crate::video;

/// Parameters for creating a new scan job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub priority: JobPriority,
    pub is_own_video: bool,
    pub options: AnalysisOptions,
}

/// Creates a new `pending` job after deriving the video id from the URL
/// and clearing the duplicate guard.
///
/// The guard check is a plain read; the insert then re-checks under one
/// store lock, which narrows the enqueue race window to concurrent
/// processes only.
pub fn create(db: &Database, new: NewJob) -> Result<ScanJob, TubescanError> {
    let video_id = video::extract_video_id(&new.url).ok_or_else(|| {
        TubescanError::Validation(format!("cannot derive a video id from url: {}", new.url))
    })?;

    let check = dedup::check_duplicate(db, &new.user_id, &video_id)?;
    if check.duplicate {
        return Err(TubescanError::DuplicateJob {
            job_id: check.existing_job_id.unwrap_or_default(),
            status: check.existing_status.unwrap_or_default(),
            progress: check.existing_progress.unwrap_or(0),
        });
    }

    let row = JobRow {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        video_id,
        url: new.url,
        title: new.title,
        thumbnail: new.thumbnail,
        status: JobStatus::Pending.as_str().to_string(),
        progress: 0,
        current_step: None,
        current_step_index: 0,
        total_steps: TOTAL_STEPS,
        priority: new.priority.as_str().to_string(),
        is_own_video: new.is_own_video,
        include_transcript: new.options.include_transcript,
        include_ai: new.options.include_ai,
        include_multimodal: new.options.include_multimodal,
        result_id: None,
        error: None,
        created_at: Utc::now().to_rfc3339(),
        started_at: None,
        completed_at: None,
        archived: false,
        archived_at: None,
    };

    match job_repo::insert_unless_active(db, &row)? {
        InsertOutcome::Created => {
            log::info!(
                "Created job {} for user {} video {}",
                row.id,
                row.user_id,
                row.video_id
            );
            ScanJob::from_row(row)
        }
        InsertOutcome::Duplicate(existing) => Err(TubescanError::DuplicateJob {
            job_id: existing.id,
            status: existing.status,
            progress: existing.progress,
        }),
    }
}

/// Applies a partial update to a job, enforcing the transition rules.
///
/// `caller` is the user asserting ownership; pass `None` for internal
/// (worker-side) updates, which bypass the ownership check.
///
/// Rules:
/// - terminal jobs reject every update,
/// - `progress` is clamped to `[0, 100]` and never decreases,
/// - `currentStepIndex` is clamped to `[0, totalSteps - 1]`,
/// - the first transition into `processing` stamps `startedAt` (later
///   `processing` updates do not re-stamp),
/// - entering a terminal status stamps `completedAt`.
///
/// The write itself is guarded in SQL: it only lands while the row is
/// still active, so a concurrent cancel or completion between our read
/// and our write wins, and this call reports `InvalidState` instead of
/// resurrecting the row.
pub fn advance(
    db: &Database,
    job_id: &str,
    caller: Option<&str>,
    update: &JobUpdate,
) -> Result<ScanJob, TubescanError> {
    let mut row = job_repo::find_by_id(db, job_id)?
        .ok_or_else(|| TubescanError::NotFound(job_id.to_string()))?;

    if let Some(user) = caller {
        if row.user_id != user {
            return Err(TubescanError::Ownership(job_id.to_string()));
        }
    }

    let current = JobStatus::parse(&row.status)?;
    if current.is_terminal() {
        return Err(TubescanError::InvalidState(format!(
            "job {} is {} and cannot be updated",
            job_id, row.status
        )));
    }

    if let Some(progress) = update.progress {
        let clamped = progress.clamp(0, 100) as u8;
        // Monotonic while non-terminal.
        row.progress = row.progress.max(clamped);
    }
    if let Some(index) = update.current_step_index {
        row.current_step_index = index.clamp(0, (row.total_steps - 1) as i64) as u32;
    }
    if let Some(ref step) = update.current_step {
        row.current_step = Some(step.clone());
    }
    if let Some(ref title) = update.title {
        row.title = Some(title.clone());
    }
    if let Some(ref thumbnail) = update.thumbnail {
        row.thumbnail = Some(thumbnail.clone());
    }
    if let Some(ref error) = update.error {
        row.error = Some(error.clone());
    }
    if let Some(ref result_id) = update.result_id {
        row.result_id = Some(result_id.clone());
    }

    if let Some(status) = update.status {
        if status == JobStatus::Processing && row.started_at.is_none() {
            row.started_at = Some(Utc::now().to_rfc3339());
        }
        if status.is_terminal() {
            row.completed_at = Some(Utc::now().to_rfc3339());
        }
        row.status = status.as_str().to_string();
    }

    if !job_repo::update_in_flight(db, &row)? {
        return Err(TubescanError::InvalidState(format!(
            "job {} reached a terminal state and cannot be updated",
            job_id
        )));
    }

    // The stored row is authoritative: the SQL floors on progress and
    // started_at may have kept values from a concurrent writer.
    let row = job_repo::find_by_id(db, job_id)?
        .ok_or_else(|| TubescanError::NotFound(job_id.to_string()))?;

    log::debug!(
        "Advanced job {}: status={} progress={} step={}",
        row.id,
        row.status,
        row.progress,
        row.current_step_index
    );

    ScanJob::from_row(row)
}

/// Cancels a `pending` job or deletes a terminal one.
///
/// Jobs in `processing` are rejected: they run to completion or are
/// force-failed by the dispatcher's staleness pass, never removed
/// mid-flight, so external work is not orphaned.
pub fn cancel_or_delete(db: &Database, job_id: &str, caller: &str) -> Result<(), TubescanError> {
    let row = job_repo::find_by_id(db, job_id)?
        .ok_or_else(|| TubescanError::NotFound(job_id.to_string()))?;

    if row.user_id != caller {
        return Err(TubescanError::Ownership(job_id.to_string()));
    }

    if row.status == JobStatus::Processing.as_str() {
        return Err(TubescanError::InvalidState(format!(
            "job {} is processing and cannot be deleted",
            job_id
        )));
    }

    job_repo::delete(db, job_id)?;
    log::info!("Deleted job {} (was {})", job_id, row.status);
    Ok(())
}

/// Batch-archives the caller's terminal jobs. Jobs the caller does not
/// own, non-terminal jobs and already-archived jobs are skipped silently.
/// Returns the number newly archived.
pub fn archive(db: &Database, caller: &str, job_ids: &[String]) -> Result<u64, TubescanError> {
    let count = job_repo::archive_batch(db, caller, job_ids, &Utc::now().to_rfc3339())?;
    if count > 0 {
        log::info!("Archived {} job(s) for user {}", count, caller);
    }
    Ok(count)
}

/// Force-fails a job that a worker abandoned. Internal use only.
pub fn force_fail(db: &Database, job_id: &str, reason: &str) -> Result<(), TubescanError> {
    advance(
        db,
        job_id,
        None,
        &JobUpdate {
            status: Some(JobStatus::Failed),
            error: Some(reason.to_string()),
            ..Default::default()
        },
    )?;
    log::warn!("Force-failed job {}: {}", job_id, reason);
    Ok(())
}
