//! Queue dispatcher and worker pool.
//!
//! A coordinator thread polls the store for eligible pending jobs, claims
//! them atomically and feeds them to worker threads over a bounded
//! channel. Each worker runs the pipeline to a terminal state and emits
//! the completion notification.
//!
//! Coordination happens entirely through store reads and writes; there is
//! no in-memory queue state to lose on restart. Eligibility ordering is
//! computed in memory over the pending set rather than relying on
//! store-side ordering.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::{ContentAnalyzer, ResultStore, VideoSource};
use crate::broadcast::ScanEventBroadcaster;
use crate::config::QueueConfig;
use crate::db::notification_repo::{self, NotificationRow};
use crate::db::{job_repo, Database};
use crate::error::TubescanError;
use crate::pipeline::{BroadcastProgress, Pipeline, PipelineConfig};
use crate::queue::job::{JobPriority, JobStatus, ScanJob};
use crate::queue::lifecycle;

/// Selects eligible pending jobs and claims as many as the concurrency
/// bounds allow. Returns the claimed jobs, highest priority first.
///
/// Eligibility: status `pending`, ordered by priority rank then creation
/// time ascending. A claim can lose the race against another process;
/// losers are simply skipped.
pub fn select_and_claim(
    db: &Database,
    config: &QueueConfig,
) -> Result<Vec<ScanJob>, TubescanError> {
    let mut pending = job_repo::list_pending(db)?;
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    pending.sort_by(|a, b| {
        let rank_a = JobPriority::parse(&a.priority).map(|p| p.rank()).unwrap_or(0);
        let rank_b = JobPriority::parse(&b.priority).map(|p| p.rank()).unwrap_or(0);
        rank_b
            .cmp(&rank_a)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let mut global = job_repo::count_processing(db, None)?;
    let mut per_user: HashMap<String, u64> = HashMap::new();
    let mut claimed = Vec::new();

    for row in pending {
        if global >= config.global_limit {
            break;
        }
        let user_count = match per_user.entry(row.user_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let count = job_repo::count_processing(db, Some(&row.user_id))?;
                entry.insert(count)
            }
        };
        if *user_count >= config.per_user_limit {
            continue;
        }

        if !job_repo::try_claim(db, &row.id, &Utc::now().to_rfc3339())? {
            // Lost to a concurrent claimer.
            continue;
        }
        global += 1;
        *user_count += 1;

        match job_repo::find_by_id(db, &row.id)? {
            Some(fresh) => claimed.push(ScanJob::from_row(fresh)?),
            None => warn!("Job {} vanished after claim", row.id),
        }
    }

    if !claimed.is_empty() {
        debug!("Claimed {} job(s) for dispatch", claimed.len());
    }
    Ok(claimed)
}

/// Force-fails jobs stuck in `processing` longer than `max_age`, covering
/// workers that died without reaching a terminal state. Returns the
/// number of jobs failed.
pub fn recover_stale(db: &Database, max_age: Duration) -> Result<u64, TubescanError> {
    let cutoff = Utc::now()
        - chrono::Duration::from_std(max_age)
            .map_err(|e| TubescanError::Config(format!("invalid staleness window: {e}")))?;

    let stale = job_repo::find_stale_processing(db, &cutoff.to_rfc3339())?;
    let mut failed = 0;
    for row in stale {
        let reason = format!(
            "worker lost: processing since {} exceeded the allowed duration",
            row.started_at.as_deref().unwrap_or("unknown")
        );
        match lifecycle::force_fail(db, &row.id, &reason) {
            Ok(()) => failed += 1,
            Err(e) => error!("Failed to recover stale job {}: {}", row.id, e),
        }
    }
    Ok(failed)
}

/// Persists the completion notification for a finished job. Best-effort:
/// a store failure is logged, the job's terminal state stays authoritative.
fn record_completion(db: &Database, job: &ScanJob) {
    let row = NotificationRow {
        id: Uuid::new_v4().to_string(),
        user_id: job.user_id.clone(),
        job_id: job.id.clone(),
        result_id: job.result_id.clone(),
        title: job.title.clone(),
        video_id: job.video_id.clone(),
        event_type: "completed".to_string(),
        is_read: false,
        created_at: Utc::now().to_rfc3339(),
    };
    if let Err(e) = notification_repo::insert(db, &row) {
        error!("Failed to record completion notification for {}: {}", job.id, e);
    }
}

/// External collaborators shared by all workers.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn VideoSource>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub results: Arc<dyn ResultStore>,
}

pub struct Dispatcher {
    workers: Vec<JoinHandle<()>>,
    coordinator: Option<JoinHandle<()>>,
    job_sender: Option<Sender<ScanJob>>,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Starts the worker pool and the coordinator polling loop.
    pub fn start(
        db: Database,
        config: QueueConfig,
        collaborators: Collaborators,
        broadcaster: Arc<ScanEventBroadcaster>,
    ) -> Self {
        let worker_count = config.worker_count;
        let (job_sender, job_receiver) = bounded::<ScanJob>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let pipeline_config = PipelineConfig::from_queue_config(&config);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let pipeline = Pipeline::new(
                db.clone(),
                pipeline_config.clone(),
                Arc::clone(&collaborators.source),
                Arc::clone(&collaborators.analyzer),
                Arc::clone(&collaborators.results),
            );
            let worker_db = db.clone();
            let worker_broadcaster = Arc::clone(&broadcaster);

            workers.push(thread::spawn(move || {
                run_worker(worker_id, rx, shutdown_flag, pipeline, worker_db, worker_broadcaster);
            }));
        }
        info!("Started {} scan worker(s)", worker_count);

        let coordinator = {
            let db = db.clone();
            let sender = job_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            thread::spawn(move || {
                run_coordinator(db, config, sender, shutdown_flag);
            })
        };

        Self {
            workers,
            coordinator: Some(coordinator),
            job_sender: Some(job_sender),
            shutdown,
        }
    }

    /// Signals all threads to stop after their current job.
    pub fn shutdown(&self) {
        info!("Shutting down dispatcher...");
        self.shutdown.store(true, Ordering::Release);
    }

    /// Waits for the coordinator and all workers to exit.
    pub fn wait(mut self) {
        self.shutdown.store(true, Ordering::Release);
        // Dropping the sender unblocks workers waiting on the channel.
        drop(self.job_sender.take());

        if let Some(coordinator) = self.coordinator.take() {
            if coordinator.join().is_err() {
                error!("Coordinator thread panicked");
            }
        }
        for (i, worker) in self.workers.drain(..).enumerate() {
            if worker.join().is_err() {
                error!("Worker {} panicked", i);
            } else {
                debug!("Worker {} finished", i);
            }
        }
        info!("Dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        drop(self.job_sender.take());
    }
}

fn run_coordinator(
    db: Database,
    config: QueueConfig,
    sender: Sender<ScanJob>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Coordinator started");
    while !shutdown.load(Ordering::Acquire) {
        match recover_stale(&db, config.stale_processing_max()) {
            Ok(0) => {}
            Ok(n) => warn!("Force-failed {} stale processing job(s)", n),
            Err(e) => error!("Stale job recovery failed: {}", e),
        }

        match select_and_claim(&db, &config) {
            Ok(jobs) => {
                for job in jobs {
                    if sender.send(job).is_err() {
                        debug!("Worker channel closed, coordinator exiting");
                        return;
                    }
                }
            }
            Err(e) => error!("Job selection failed: {}", e),
        }

        thread::sleep(config.poll_interval());
    }
    debug!("Coordinator stopped");
}

fn run_worker(
    worker_id: usize,
    receiver: Receiver<ScanJob>,
    shutdown: Arc<AtomicBool>,
    pipeline: Pipeline,
    db: Database,
    broadcaster: Arc<ScanEventBroadcaster>,
) {
    debug!("Worker {} started", worker_id);
    let progress = BroadcastProgress::new(broadcaster);

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        let job = match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let job_id = job.id.clone();
        debug!("Worker {} picked up job {}", worker_id, job_id);

        match pipeline.run(job, &progress) {
            Ok(done) if done.status == JobStatus::Completed => {
                info!("Job {} completed with result {:?}", done.id, done.result_id);
                record_completion(&db, &done);
            }
            Ok(done) => {
                warn!(
                    "Job {} ended as {}: {}",
                    done.id,
                    done.status,
                    done.error.as_deref().unwrap_or("no error recorded")
                );
            }
            Err(e) => {
                error!("Worker {} could not record outcome of job {}: {}", worker_id, job_id, e);
            }
        }
    }
    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stubs::{MemoryResultStore, StubAnalyzer, StubVideoSource};
    use crate::queue::job::{AnalysisOptions, JobUpdate};
    use crate::queue::lifecycle::NewJob;

    fn test_config() -> QueueConfig {
        QueueConfig {
            worker_count: 2,
            per_user_limit: 2,
            global_limit: 3,
            poll_interval_ms: 20,
            retry_base_ms: 1,
            retry_cap_ms: 4,
            ..Default::default()
        }
    }

    fn enqueue(db: &Database, user: &str, video: &str, priority: JobPriority) -> ScanJob {
        lifecycle::create(
            db,
            NewJob {
                user_id: user.to_string(),
                url: format!("https://www.youtube.com/watch?v={video}"),
                title: None,
                thumbnail: None,
                priority,
                is_own_video: false,
                options: AnalysisOptions::default(),
            },
        )
        .unwrap()
    }

    fn stub_collaborators() -> (Collaborators, Arc<MemoryResultStore>) {
        let results = Arc::new(MemoryResultStore::default());
        (
            Collaborators {
                source: Arc::new(StubVideoSource::default()),
                analyzer: Arc::new(StubAnalyzer),
                results: Arc::clone(&results) as Arc<dyn ResultStore>,
            },
            results,
        )
    }

    #[test]
    fn test_selection_orders_priority_then_fifo() {
        let db = Database::open_in_memory().unwrap();
        // Interleave priorities across distinct videos and users so no
        // concurrency bound interferes.
        let low = enqueue(&db, "u1", "aaaaaaaaaaa", JobPriority::Low);
        let high = enqueue(&db, "u2", "bbbbbbbbbbb", JobPriority::High);
        let normal = enqueue(&db, "u3", "ccccccccccc", JobPriority::Normal);

        let config = QueueConfig {
            global_limit: 10,
            ..test_config()
        };
        let claimed = select_and_claim(&db, &config).unwrap();
        let ids: Vec<&str> = claimed.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec![high.id.as_str(), normal.id.as_str(), low.id.as_str()]);

        for job in &claimed {
            assert_eq!(job.status, JobStatus::Processing);
            assert!(job.started_at.is_some());
        }
    }

    #[test]
    fn test_global_limit_bounds_claims() {
        let db = Database::open_in_memory().unwrap();
        for (user, video) in [
            ("u1", "aaaaaaaaaaa"),
            ("u2", "bbbbbbbbbbb"),
            ("u3", "ccccccccccc"),
            ("u4", "ddddddddddd"),
            ("u5", "eeeeeeeeeee"),
        ] {
            enqueue(&db, user, video, JobPriority::Normal);
        }

        let claimed = select_and_claim(&db, &test_config()).unwrap();
        assert_eq!(claimed.len(), 3);
        assert_eq!(job_repo::count_processing(&db, None).unwrap(), 3);
    }

    #[test]
    fn test_per_user_limit_skips_but_fills_with_others() {
        let db = Database::open_in_memory().unwrap();
        enqueue(&db, "u1", "aaaaaaaaaaa", JobPriority::High);
        enqueue(&db, "u1", "bbbbbbbbbbb", JobPriority::High);
        enqueue(&db, "u1", "ccccccccccc", JobPriority::High);
        enqueue(&db, "u2", "ddddddddddd", JobPriority::Low);

        let claimed = select_and_claim(&db, &test_config()).unwrap();
        let users: Vec<&str> = claimed.iter().map(|j| j.user_id.as_str()).collect();
        // Two for u1 (limit), then u2's low-priority job fills the rest.
        assert_eq!(users, vec!["u1", "u1", "u2"]);
    }

    #[test]
    fn test_existing_processing_counts_against_limits() {
        let db = Database::open_in_memory().unwrap();
        let running = enqueue(&db, "u1", "aaaaaaaaaaa", JobPriority::Normal);
        lifecycle::advance(
            &db,
            &running.id,
            None,
            &JobUpdate {
                status: Some(JobStatus::Processing),
                ..Default::default()
            },
        )
        .unwrap();
        enqueue(&db, "u1", "bbbbbbbbbbb", JobPriority::Normal);
        enqueue(&db, "u1", "ccccccccccc", JobPriority::Normal);

        let claimed = select_and_claim(&db, &test_config()).unwrap();
        // per_user_limit is 2 and one slot is already taken.
        assert_eq!(claimed.len(), 1);
    }

    #[test]
    fn test_recover_stale_force_fails_old_processing() {
        let db = Database::open_in_memory().unwrap();
        let job = enqueue(&db, "u1", "aaaaaaaaaaa", JobPriority::Normal);
        // Claim far in the past.
        job_repo::try_claim(&db, &job.id, "2020-01-01T00:00:00+00:00").unwrap();

        let failed = recover_stale(&db, Duration::from_secs(60)).unwrap();
        assert_eq!(failed, 1);

        let row = job_repo::find_by_id(&db, &job.id).unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert!(row.error.unwrap().contains("worker lost"));

        // Fresh processing jobs are untouched.
        let fresh = enqueue(&db, "u1", "bbbbbbbbbbb", JobPriority::Normal);
        job_repo::try_claim(&db, &fresh.id, &Utc::now().to_rfc3339()).unwrap();
        assert_eq!(recover_stale(&db, Duration::from_secs(60)).unwrap(), 0);
    }

    #[test]
    fn test_dispatcher_end_to_end() {
        let db = Database::open_in_memory().unwrap();
        let (collaborators, results) = stub_collaborators();
        let broadcaster = Arc::new(ScanEventBroadcaster::new(64));

        let job = enqueue(&db, "u1", "dQw4w9WgXcQ", JobPriority::Normal);

        let dispatcher = Dispatcher::start(
            db.clone(),
            test_config(),
            collaborators,
            Arc::clone(&broadcaster),
        );

        // Poll until the job reaches a terminal state.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let row = job_repo::find_by_id(&db, &job.id).unwrap().unwrap();
            if row.status == "completed" {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "job did not complete in time (status {})",
                row.status
            );
            thread::sleep(Duration::from_millis(20));
        }

        dispatcher.shutdown();
        dispatcher.wait();

        let row = job_repo::find_by_id(&db, &job.id).unwrap().unwrap();
        assert_eq!(row.progress, 100);
        assert!(row.result_id.is_some());
        assert_eq!(results.len(), 1);

        // Completion notification persisted for client polling.
        let notes = notification_repo::list_for_user(&db, "u1", 10).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].event_type, "completed");
        assert_eq!(notes[0].job_id, job.id);
    }
}
