//! Deterministic collaborator stubs.
//!
//! Keyword-based risk scoring stands in for the real AI backend. The stubs
//! are deliberately deterministic so pipeline and dispatcher tests can
//! assert exact outcomes; they also make the crate runnable end to end
//! without any external service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use super::{
    AnalysisResult, ContentAnalyzer, EntitlementChecker, ExtractedContent, ResultStore,
    RiskReport, VideoMetadata, VideoSource,
};
use crate::pipeline::error::StepError;
use crate::queue::job::AnalysisOptions;

/// Keyword patterns mapped to policy flags and risk weight.
struct RiskPattern {
    flag: &'static str,
    keywords: &'static [&'static str],
    weight: u8,
}

const PATTERNS: &[RiskPattern] = &[
    RiskPattern {
        flag: "violence",
        keywords: &["fight", "weapon", "blood", "gore"],
        weight: 40,
    },
    RiskPattern {
        flag: "hate_speech",
        keywords: &["slur", "hate", "supremacy"],
        weight: 50,
    },
    RiskPattern {
        flag: "misinformation",
        keywords: &["miracle cure", "hoax", "fake news"],
        weight: 30,
    },
    RiskPattern {
        flag: "adult_content",
        keywords: &["explicit", "nsfw"],
        weight: 45,
    },
];

/// Serves canned metadata and a transcript synthesized from the video id.
#[derive(Default)]
pub struct StubVideoSource {
    /// Optional per-video transcript overrides.
    transcripts: Mutex<HashMap<String, String>>,
}

impl StubVideoSource {
    pub fn with_transcript(self, video_id: &str, transcript: &str) -> Self {
        if let Ok(mut map) = self.transcripts.lock() {
            map.insert(video_id.to_string(), transcript.to_string());
        }
        self
    }
}

impl VideoSource for StubVideoSource {
    fn fetch_metadata(
        &self,
        video_id: &str,
        _timeout: Duration,
    ) -> Result<VideoMetadata, StepError> {
        Ok(VideoMetadata {
            video_id: video_id.to_string(),
            title: format!("Video {video_id}"),
            thumbnail: Some(format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")),
            duration_secs: 300,
        })
    }

    fn extract_content(
        &self,
        video_id: &str,
        options: &AnalysisOptions,
        _timeout: Duration,
    ) -> Result<ExtractedContent, StepError> {
        let transcript = if options.include_transcript {
            let map = self
                .transcripts
                .lock()
                .map_err(|_| StepError::Permanent("stub transcript lock poisoned".into()))?;
            Some(
                map.get(video_id)
                    .cloned()
                    .unwrap_or_else(|| format!("transcript of {video_id}")),
            )
        } else {
            None
        };

        Ok(ExtractedContent {
            transcript,
            description: Some(format!("description of {video_id}")),
        })
    }
}

/// Keyword matcher standing in for the AI backend.
#[derive(Default)]
pub struct StubAnalyzer;

impl ContentAnalyzer for StubAnalyzer {
    fn analyze(
        &self,
        content: &ExtractedContent,
        _options: &AnalysisOptions,
        _timeout: Duration,
    ) -> Result<serde_json::Value, StepError> {
        let text = format!(
            "{} {}",
            content.transcript.as_deref().unwrap_or(""),
            content.description.as_deref().unwrap_or("")
        )
        .to_lowercase();

        let matches: Vec<serde_json::Value> = PATTERNS
            .iter()
            .filter(|p| p.keywords.iter().any(|k| text.contains(k)))
            .map(|p| json!({ "flag": p.flag, "weight": p.weight }))
            .collect();

        Ok(json!({ "matches": matches }))
    }

    fn score_risk(&self, analysis: &serde_json::Value) -> Result<RiskReport, StepError> {
        let matches = analysis
            .get("matches")
            .and_then(|m| m.as_array())
            .ok_or_else(|| StepError::Permanent("malformed analysis payload".into()))?;

        let mut score: u64 = 0;
        let mut flags = Vec::new();
        for m in matches {
            if let Some(flag) = m.get("flag").and_then(|f| f.as_str()) {
                flags.push(flag.to_string());
            }
            score += m.get("weight").and_then(|w| w.as_u64()).unwrap_or(0);
        }

        Ok(RiskReport {
            risk_score: score.min(100) as u8,
            flags,
        })
    }

    fn suggest(&self, risk: &RiskReport) -> Result<Vec<String>, StepError> {
        if risk.flags.is_empty() {
            return Ok(vec!["No policy concerns detected.".to_string()]);
        }
        Ok(risk
            .flags
            .iter()
            .map(|f| format!("Review segments flagged for {f} before publishing."))
            .collect())
    }
}

/// In-memory result store handing out sequential ids.
#[derive(Default)]
pub struct MemoryResultStore {
    next_id: AtomicU64,
    results: Mutex<HashMap<String, AnalysisResult>>,
}

impl MemoryResultStore {
    pub fn get(&self, result_id: &str) -> Option<AnalysisResult> {
        self.results.lock().ok()?.get(result_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryResultStore {
    fn store(&self, result: &AnalysisResult) -> Result<String, StepError> {
        let id = format!("result-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.results
            .lock()
            .map_err(|_| StepError::Permanent("result store lock poisoned".into()))?
            .insert(id.clone(), result.clone());
        Ok(id)
    }
}

/// Entitlement stub: everyone may enqueue, except users on the deny list.
#[derive(Default)]
pub struct AllowAllEntitlements {
    denied: Vec<String>,
}

impl AllowAllEntitlements {
    pub fn denying(users: &[&str]) -> Self {
        Self {
            denied: users.iter().map(|u| u.to_string()).collect(),
        }
    }
}

impl EntitlementChecker for AllowAllEntitlements {
    fn can_enqueue(&self, user_id: &str) -> bool {
        !self.denied.iter().any(|u| u == user_id)
    }
}
