//! Live scan event fan-out.
//!
//! Delivery is at-most-once best-effort: a send with no connected
//! receivers is logged and dropped, never retried. The job row in the
//! store stays the authoritative state; clients reconcile by polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        job_id: String,
        user_id: String,
        step: String,
        step_index: u32,
        progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        job_id: String,
        user_id: String,
        video_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        result_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        job_id: String,
        user_id: String,
        error: String,
    },
}

impl ScanEvent {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Progress { user_id, .. }
            | Self::Completed { user_id, .. }
            | Self::Failed { user_id, .. } => user_id,
        }
    }
}

/// Fan-out channel for scan events.
pub struct ScanEventBroadcaster {
    sender: broadcast::Sender<ScanEvent>,
}

impl ScanEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends the event to all current subscribers. A send failure only
    /// means nobody is listening right now.
    pub fn emit(&self, event: ScanEvent) {
        if let Err(e) = self.sender.send(event) {
            log::debug!("No subscribers for scan event: {:?}", e.0);
        }
    }
}

impl Default for ScanEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
