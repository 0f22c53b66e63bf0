use crate::analysis::{ExtractedContent, RiskReport, VideoMetadata};
use crate::queue::job::ScanJob;

/// Mutable state threaded through a pipeline run. Each step fills in its
/// artifact; later steps read what earlier ones produced.
pub struct PipelineContext {
    pub job: ScanJob,
    pub metadata: Option<VideoMetadata>,
    pub content: Option<ExtractedContent>,
    pub analysis: Option<serde_json::Value>,
    pub risk: Option<RiskReport>,
    pub suggestions: Vec<String>,
    pub result_id: Option<String>,
}

impl PipelineContext {
    pub fn new(job: ScanJob) -> Self {
        Self {
            job,
            metadata: None,
            content: None,
            analysis: None,
            risk: None,
            suggestions: Vec::new(),
            result_id: None,
        }
    }
}
