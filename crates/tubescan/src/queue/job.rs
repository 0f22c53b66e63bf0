//! Core job domain types.

use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobRow;
use crate::error::TubescanError;

/// Number of pipeline steps every job passes through.
pub const TOTAL_STEPS: u32 = 5;

/// The fixed pipeline step table: `(name, progress target at completion)`.
pub const STEPS: [(&str, u8); TOTAL_STEPS as usize] = [
    ("preparation", 20),
    ("content_extraction", 40),
    ("ai_analysis", 60),
    ("risk_analysis", 80),
    ("suggestions", 100),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, TubescanError> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TubescanError::Validation(format!(
                "unknown job status: {other}"
            ))),
        }
    }

    /// Terminal statuses admit no further transition (apart from the
    /// archived flag).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Result<Self, TubescanError> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(TubescanError::Validation(format!(
                "unknown priority: {other}"
            ))),
        }
    }

    /// Selection rank, higher runs first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
        }
    }
}

/// Per-job analysis options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    pub include_transcript: bool,
    pub include_ai: bool,
    pub include_multimodal: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_transcript: true,
            include_ai: true,
            include_multimodal: false,
        }
    }
}

/// A scan job as seen by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub current_step_index: u32,
    pub total_steps: u32,
    pub priority: JobPriority,
    pub is_own_video: bool,
    pub options: AnalysisOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
}

impl ScanJob {
    pub fn from_row(row: JobRow) -> Result<Self, TubescanError> {
        Ok(Self {
            status: JobStatus::parse(&row.status)?,
            priority: JobPriority::parse(&row.priority)?,
            id: row.id,
            user_id: row.user_id,
            video_id: row.video_id,
            url: row.url,
            title: row.title,
            thumbnail: row.thumbnail,
            progress: row.progress,
            current_step: row.current_step,
            current_step_index: row.current_step_index,
            total_steps: row.total_steps,
            is_own_video: row.is_own_video,
            options: AnalysisOptions {
                include_transcript: row.include_transcript,
                include_ai: row.include_ai,
                include_multimodal: row.include_multimodal,
            },
            result_id: row.result_id,
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            archived: row.archived,
            archived_at: row.archived_at,
        })
    }

    pub fn to_row(&self) -> JobRow {
        JobRow {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            video_id: self.video_id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            status: self.status.as_str().to_string(),
            progress: self.progress,
            current_step: self.current_step.clone(),
            current_step_index: self.current_step_index,
            total_steps: self.total_steps,
            priority: self.priority.as_str().to_string(),
            is_own_video: self.is_own_video,
            include_transcript: self.options.include_transcript,
            include_ai: self.options.include_ai,
            include_multimodal: self.options.include_multimodal,
            result_id: self.result_id.clone(),
            error: self.error.clone(),
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            completed_at: self.completed_at.clone(),
            archived: self.archived,
            archived_at: self.archived_at.clone(),
        }
    }
}

/// Caller-supplied fields for a status update. Everything is optional;
/// absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i64>,
    pub current_step: Option<String>,
    pub current_step_index: Option<i64>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub error: Option<String>,
    pub result_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in ["pending", "processing", "completed", "failed", "cancelled"] {
            assert_eq!(JobStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(JobStatus::parse("archived").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_priority_ranking() {
        assert!(JobPriority::High.rank() > JobPriority::Normal.rank());
        assert!(JobPriority::Normal.rank() > JobPriority::Low.rank());
    }

    #[test]
    fn test_step_table() {
        assert_eq!(STEPS.len() as u32, TOTAL_STEPS);
        assert_eq!(STEPS[0], ("preparation", 20));
        assert_eq!(STEPS[4], ("suggestions", 100));
        // Progress targets are strictly increasing.
        for pair in STEPS.windows(2) {
            assert!(pair[0].1 < pair[1].1);
        }
    }

    #[test]
    fn test_scan_job_serializes_camel_case() {
        let row = crate::db::job_repo::JobRow {
            id: "j1".into(),
            user_id: "u1".into(),
            video_id: "dQw4w9WgXcQ".into(),
            url: "https://youtu.be/dQw4w9WgXcQ".into(),
            title: None,
            thumbnail: None,
            status: "pending".into(),
            progress: 0,
            current_step: None,
            current_step_index: 0,
            total_steps: 5,
            priority: "high".into(),
            is_own_video: false,
            include_transcript: true,
            include_ai: true,
            include_multimodal: false,
            result_id: None,
            error: None,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            started_at: None,
            completed_at: None,
            archived: false,
            archived_at: None,
        };
        let job = ScanJob::from_row(row).unwrap();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["videoId"], "dQw4w9WgXcQ");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["totalSteps"], 5);
        assert!(json.get("resultId").is_none());
    }
}
