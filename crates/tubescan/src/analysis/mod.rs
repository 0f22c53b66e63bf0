//! External collaborator interfaces.
//!
//! The queue treats video access, AI analysis, result storage and billing
//! entitlement as opaque collaborators behind these traits. Production
//! wiring plugs in the real clients; tests use the stubs in [`stubs`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::StepError;
use crate::queue::job::AnalysisOptions;

pub mod stubs;

/// Basic metadata about a video, fetched during the preparation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
}

/// Content extracted from a video for analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Policy/risk assessment computed from the AI analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    /// 0 (harmless) to 100 (certain violation).
    pub risk_score: u8,
    pub flags: Vec<String>,
}

/// Final assembled analysis result handed to the result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub job_id: String,
    pub user_id: String,
    pub video_id: String,
    pub metadata: VideoMetadata,
    /// Opaque payload from the AI collaborator.
    pub analysis: serde_json::Value,
    pub risk: RiskReport,
    pub suggestions: Vec<String>,
}

/// Access to video metadata and content.
pub trait VideoSource: Send + Sync {
    fn fetch_metadata(&self, video_id: &str, timeout: Duration)
        -> Result<VideoMetadata, StepError>;

    fn extract_content(
        &self,
        video_id: &str,
        options: &AnalysisOptions,
        timeout: Duration,
    ) -> Result<ExtractedContent, StepError>;
}

/// The AI analysis collaborator. `analyze` is opaque; the risk and
/// suggestion passes interpret its output.
pub trait ContentAnalyzer: Send + Sync {
    fn analyze(
        &self,
        content: &ExtractedContent,
        options: &AnalysisOptions,
        timeout: Duration,
    ) -> Result<serde_json::Value, StepError>;

    fn score_risk(&self, analysis: &serde_json::Value) -> Result<RiskReport, StepError>;

    fn suggest(&self, risk: &RiskReport) -> Result<Vec<String>, StepError>;
}

/// Persists a finished analysis result and returns its id.
pub trait ResultStore: Send + Sync {
    fn store(&self, result: &AnalysisResult) -> Result<String, StepError>;
}

/// Billing entitlement gate consulted on enqueue.
pub trait EntitlementChecker: Send + Sync {
    fn can_enqueue(&self, user_id: &str) -> bool;
}
