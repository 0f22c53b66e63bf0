//! The queue service facade.
//!
//! Transport-neutral surface a HTTP/RPC layer calls into. Listing
//! endpoints are polled frequently by clients, so store failures there
//! degrade to empty results instead of propagating.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::EntitlementChecker;
use crate::broadcast::{ScanEvent, ScanEventBroadcaster};
use crate::config::QueueConfig;
use crate::db::{job_repo, notification_repo, tab_repo, Database};
use crate::error::TubescanError;
use crate::queue::job::{AnalysisOptions, JobPriority, JobUpdate, ScanJob};
use crate::queue::{dispatcher, lifecycle, sweeper};

/// Parameters for an enqueue call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default)]
    pub is_own_video: bool,
    #[serde(default)]
    pub options: AnalysisOptions,
}

/// Per-status job counts for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

/// A page of jobs plus aggregate stats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub items: Vec<ScanJob>,
    pub stats: JobStats,
    pub has_more: bool,
}

impl JobList {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            stats: JobStats::default(),
            has_more: false,
        }
    }
}

/// A persisted notification as seen by callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub video_id: String,
    pub event_type: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct QueueService {
    db: Database,
    config: QueueConfig,
    entitlements: Arc<dyn EntitlementChecker>,
    broadcaster: Arc<ScanEventBroadcaster>,
}

impl QueueService {
    pub fn new(
        db: Database,
        config: QueueConfig,
        entitlements: Arc<dyn EntitlementChecker>,
    ) -> Self {
        let broadcaster = Arc::new(ScanEventBroadcaster::new(config.event_capacity));
        Self {
            db,
            config,
            entitlements,
            broadcaster,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> Arc<ScanEventBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Subscribes to live scan events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.broadcaster.subscribe()
    }

    /// Starts the worker pool against this service's store and config.
    pub fn start_dispatcher(&self, collaborators: dispatcher::Collaborators) -> dispatcher::Dispatcher {
        dispatcher::Dispatcher::start(
            self.db.clone(),
            self.config.clone(),
            collaborators,
            self.broadcaster(),
        )
    }

    /// Builds the scheduled retention sweeper for this service's store.
    pub fn sweep_scheduler(&self) -> sweeper::SweepScheduler {
        sweeper::SweepScheduler::new(
            self.db.clone(),
            self.config.sweep_interval(),
            self.config.retention(),
        )
    }

    /// Enqueues a new scan. Fails with `QuotaExceeded` when the billing
    /// collaborator declines, `Validation` on an unparseable URL, and
    /// `DuplicateJob` when an active job for the video already exists.
    pub fn enqueue(&self, user_id: &str, request: EnqueueRequest) -> Result<ScanJob, TubescanError> {
        if !self.entitlements.can_enqueue(user_id) {
            return Err(TubescanError::QuotaExceeded(user_id.to_string()));
        }

        lifecycle::create(
            &self.db,
            lifecycle::NewJob {
                user_id: user_id.to_string(),
                url: request.url,
                title: request.title,
                thumbnail: request.thumbnail,
                priority: request.priority,
                is_own_video: request.is_own_video,
                options: request.options,
            },
        )
    }

    /// Applies a caller-supplied partial update to an owned job.
    pub fn update_status(
        &self,
        job_id: &str,
        user_id: &str,
        update: JobUpdate,
    ) -> Result<ScanJob, TubescanError> {
        lifecycle::advance(&self.db, job_id, Some(user_id), &update)
    }

    /// Deletes a non-processing job owned by the caller.
    pub fn delete_job(&self, job_id: &str, user_id: &str) -> Result<(), TubescanError> {
        lifecycle::cancel_or_delete(&self.db, job_id, user_id)
    }

    /// Lists a user's jobs, newest first, with per-status stats.
    ///
    /// `status` may be a concrete status or `"active"`, which returns all
    /// non-archived jobs and computes stats over that same view. Store
    /// failures degrade to an empty page.
    pub fn list_jobs(
        &self,
        user_id: &str,
        status: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<JobList, TubescanError> {
        let active_view = status == Some("active");
        let status_filter = match status {
            None => None,
            Some("active") => None,
            // Reject unknown statuses before touching the store.
            Some(s) => Some(crate::queue::job::JobStatus::parse(s)?.as_str().to_string()),
        };

        let filter = job_repo::JobFilter {
            user_id: Some(user_id.to_string()),
            status: status_filter,
            exclude_archived: active_view,
            limit: Some(limit),
            offset: Some(offset),
        };

        let (rows, total) = match job_repo::query(&self.db, &filter) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Job listing failed for user {}: {}", user_id, e);
                return Ok(JobList::empty());
            }
        };

        let stats = match job_repo::status_counts_for_user(&self.db, user_id, active_view) {
            Ok(counts) => {
                let mut stats = JobStats::default();
                for (status, count) in counts {
                    match status.as_str() {
                        "pending" => stats.pending = count,
                        "processing" => stats.processing = count,
                        "completed" => stats.completed = count,
                        "failed" => stats.failed = count,
                        "cancelled" => stats.cancelled = count,
                        other => log::warn!("Unknown status {} in stats for {}", other, user_id),
                    }
                    stats.total += count;
                }
                stats
            }
            Err(e) => {
                log::error!("Stats aggregation failed for user {}: {}", user_id, e);
                JobStats::default()
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ScanJob::from_row(row)?);
        }
        let has_more = offset + (items.len() as u64) < total;

        Ok(JobList {
            items,
            stats,
            has_more,
        })
    }

    /// Archives the caller's terminal jobs. Idempotent per job.
    pub fn archive_completed(
        &self,
        user_id: &str,
        job_ids: &[String],
    ) -> Result<u64, TubescanError> {
        lifecycle::archive(&self.db, user_id, job_ids)
    }

    /// On-demand retention sweep scoped to the caller.
    pub fn cleanup_old(&self, user_id: &str) -> Result<u64, TubescanError> {
        sweeper::sweep(&self.db, self.config.retention(), Some(user_id))
    }

    /// Records that the user viewed a dashboard tab. Informational only.
    pub fn mark_tab_read(&self, user_id: &str, tab_name: &str) -> Result<(), TubescanError> {
        if tab_name.trim().is_empty() {
            return Err(TubescanError::Validation("tab name is empty".into()));
        }
        tab_repo::mark_read(&self.db, user_id, tab_name, &Utc::now().to_rfc3339())?;
        Ok(())
    }

    /// Lists the caller's notifications, newest first. Store failures
    /// degrade to an empty list, matching the job listing behavior.
    pub fn notifications(&self, user_id: &str, limit: u64) -> Vec<Notification> {
        match notification_repo::list_for_user(&self.db, user_id, limit) {
            Ok(rows) => rows
                .into_iter()
                .map(|row| Notification {
                    id: row.id,
                    job_id: row.job_id,
                    result_id: row.result_id,
                    title: row.title,
                    video_id: row.video_id,
                    event_type: row.event_type,
                    is_read: row.is_read,
                    created_at: row.created_at,
                })
                .collect(),
            Err(e) => {
                log::error!("Notification listing failed for user {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    pub fn unread_notifications(&self, user_id: &str) -> u64 {
        notification_repo::count_unread(&self.db, user_id).unwrap_or_else(|e| {
            log::error!("Unread count failed for user {}: {}", user_id, e);
            0
        })
    }

    pub fn mark_notification_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<(), TubescanError> {
        if !notification_repo::mark_read(&self.db, user_id, notification_id)? {
            return Err(TubescanError::NotFound(notification_id.to_string()));
        }
        Ok(())
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, TubescanError> {
        Ok(notification_repo::mark_all_read(&self.db, user_id)?)
    }
}
