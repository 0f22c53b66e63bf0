//! Retention sweeper.
//!
//! Hard-deletes completed jobs once they age past the retention window.
//! Archival is orthogonal: the archived flag only hides a job from the
//! default view, it neither delays nor triggers deletion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::db::{job_repo, notification_repo, Database};
use crate::error::TubescanError;

/// Deletes completed jobs older than `max_age`, optionally scoped to one
/// user for the on-demand cleanup endpoint. Stale notifications past the
/// same window are purged alongside. Returns the number of jobs deleted.
pub fn sweep(
    db: &Database,
    max_age: Duration,
    user_id: Option<&str>,
) -> Result<u64, TubescanError> {
    let cutoff = (Utc::now()
        - chrono::Duration::from_std(max_age)
            .map_err(|e| TubescanError::Config(format!("invalid retention window: {e}")))?)
    .to_rfc3339();

    let deleted = job_repo::delete_completed_before(db, &cutoff, user_id)?;

    if user_id.is_none() {
        let notes = notification_repo::delete_before(db, &cutoff)?;
        if notes > 0 {
            log::debug!("Swept {} old notification(s)", notes);
        }
    }

    if deleted > 0 {
        log::info!(
            "Swept {} completed job(s) older than {:?}{}",
            deleted,
            max_age,
            user_id.map(|u| format!(" for user {u}")).unwrap_or_default()
        );
    }
    Ok(deleted)
}

/// Periodic sweep scheduler. Runs in a background thread and supports a
/// manual trigger via broadcast channel.
pub struct SweepScheduler {
    db: Database,
    interval: Duration,
    retention: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    pub fn new(db: Database, interval: Duration, retention: Duration) -> Self {
        Self {
            db,
            interval,
            retention,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the sweep loop. `trigger_rx` wakes it for an immediate pass.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let db = self.db.clone();
        let interval = self.interval;
        let retention = self.retention;
        let shutdown = Arc::clone(&self.shutdown);

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Sweep scheduler could not build runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual sweep triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    if let Err(e) = sweep(&db, retention, None) {
                        log::error!("Scheduled sweep failed: {}", e);
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
