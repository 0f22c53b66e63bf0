use std::sync::Arc;

use crate::broadcast::events::{ScanEvent, ScanEventBroadcaster};
use crate::queue::job::ScanJob;

/// Events emitted by the pipeline while a job runs. Persistence goes
/// through the lifecycle manager; these are for live observers only.
pub enum ProgressEvent {
    Step {
        step: &'static str,
        step_index: u32,
        progress: u8,
    },
    Completed {
        result_id: String,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, job: &ScanJob, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _job: &ScanJob, _event: ProgressEvent) {}
}

/// Bridges pipeline progress to the live event channel.
pub struct BroadcastProgress {
    broadcaster: Arc<ScanEventBroadcaster>,
}

impl BroadcastProgress {
    pub fn new(broadcaster: Arc<ScanEventBroadcaster>) -> Self {
        Self { broadcaster }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, job: &ScanJob, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Step {
                step,
                step_index,
                progress,
            } => ScanEvent::Progress {
                job_id: job.id.clone(),
                user_id: job.user_id.clone(),
                step: step.to_string(),
                step_index,
                progress,
            },
            ProgressEvent::Completed { result_id } => ScanEvent::Completed {
                job_id: job.id.clone(),
                user_id: job.user_id.clone(),
                video_id: job.video_id.clone(),
                title: job.title.clone(),
                result_id,
            },
            ProgressEvent::Failed { error } => ScanEvent::Failed {
                job_id: job.id.clone(),
                user_id: job.user_id.clone(),
                error,
            },
        };
        self.broadcaster.emit(event);
    }
}
