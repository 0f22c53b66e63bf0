//! Deduplication guard.
//!
//! At most one pending or processing job per `(user, video)` pair should
//! exist. The check is a plain store read with no lock held across the
//! subsequent insert, so two simultaneous enqueues can still race; the
//! lifecycle manager narrows that window by re-checking under the store
//! lock at insert time. Duplicate processing is wasteful, not unsafe.

use crate::db::{job_repo, Database, StoreError};

/// Result of a duplicate check.
#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub duplicate: bool,
    pub existing_job_id: Option<String>,
    pub existing_status: Option<String>,
    pub existing_progress: Option<u8>,
}

impl DuplicateCheck {
    fn clear() -> Self {
        Self {
            duplicate: false,
            existing_job_id: None,
            existing_status: None,
            existing_progress: None,
        }
    }
}

/// Reports whether an active job already exists for `(user_id, video_id)`.
/// Pure read, no side effects.
pub fn check_duplicate(
    db: &Database,
    user_id: &str,
    video_id: &str,
) -> Result<DuplicateCheck, StoreError> {
    match job_repo::find_active_for_video(db, user_id, video_id)? {
        Some(existing) => {
            log::debug!(
                "Duplicate scan request for video {} by user {}: job {} is {}",
                video_id,
                user_id,
                existing.id,
                existing.status
            );
            Ok(DuplicateCheck {
                duplicate: true,
                existing_job_id: Some(existing.id),
                existing_status: Some(existing.status),
                existing_progress: Some(existing.progress),
            })
        }
        None => Ok(DuplicateCheck::clear()),
    }
}
