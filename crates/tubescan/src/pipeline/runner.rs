//! Pipeline runner.
//!
//! Drives a claimed job through the fixed five steps, persisting step and
//! progress updates through the lifecycle manager after each boundary.
//! Steps are strictly sequential within one job.

use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::analysis::{AnalysisResult, ContentAnalyzer, ResultStore, VideoSource};
use crate::db::Database;
use crate::error::TubescanError;
use crate::queue::job::{JobStatus, JobUpdate, ScanJob, STEPS};
use crate::queue::lifecycle;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::StepError;
use super::progress::{ProgressEvent, ProgressReporter};

pub struct Pipeline {
    db: Database,
    config: PipelineConfig,
    source: Arc<dyn VideoSource>,
    analyzer: Arc<dyn ContentAnalyzer>,
    results: Arc<dyn ResultStore>,
}

impl Pipeline {
    pub fn new(
        db: Database,
        config: PipelineConfig,
        source: Arc<dyn VideoSource>,
        analyzer: Arc<dyn ContentAnalyzer>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            db,
            config,
            source,
            analyzer,
            results,
        }
    }

    /// Runs the full pipeline for an already-claimed job. Returns the
    /// job in its terminal state (`completed` or `failed`). `Err` is
    /// reserved for store-level failures where the outcome could not be
    /// recorded at all.
    pub fn run(
        &self,
        job: ScanJob,
        progress: &dyn ProgressReporter,
    ) -> Result<ScanJob, TubescanError> {
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            video_id = %job.video_id,
            user_id = %job.user_id,
        )
        .entered();

        let mut ctx = PipelineContext::new(job);

        for (index, (name, target)) in STEPS.iter().enumerate() {
            let _step_span = info_span!("step", name = *name, index).entered();

            // Record the step about to run so observers see it in-flight.
            ctx.job = lifecycle::advance(
                &self.db,
                &ctx.job.id,
                None,
                &JobUpdate {
                    current_step: Some(name.to_string()),
                    current_step_index: Some(index as i64),
                    ..Default::default()
                },
            )?;

            if let Err(e) = self.execute_with_retry(index, &mut ctx) {
                warn!(error = %e, "Step failed terminally");
                let failed = lifecycle::advance(
                    &self.db,
                    &ctx.job.id,
                    None,
                    &JobUpdate {
                        status: Some(JobStatus::Failed),
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                )?;
                progress.report(&failed, ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Ok(failed);
            }

            // Backfill display fields from fetched metadata, without
            // overwriting what the caller supplied.
            let title = match (&ctx.job.title, &ctx.metadata) {
                (None, Some(m)) => Some(m.title.clone()),
                _ => None,
            };
            let thumbnail = match (&ctx.job.thumbnail, &ctx.metadata) {
                (None, Some(m)) => m.thumbnail.clone(),
                _ => None,
            };
            ctx.job = lifecycle::advance(
                &self.db,
                &ctx.job.id,
                None,
                &JobUpdate {
                    progress: Some(*target as i64),
                    title,
                    thumbnail,
                    ..Default::default()
                },
            )?;
            progress.report(&ctx.job, ProgressEvent::Step {
                step: name,
                step_index: index as u32,
                progress: *target,
            });
        }

        let result_id = ctx
            .result_id
            .clone()
            .ok_or_else(|| TubescanError::InvalidState("pipeline produced no result".into()))?;

        let completed = lifecycle::advance(
            &self.db,
            &ctx.job.id,
            None,
            &JobUpdate {
                status: Some(JobStatus::Completed),
                progress: Some(100),
                result_id: Some(result_id.clone()),
                ..Default::default()
            },
        )?;
        progress.report(&completed, ProgressEvent::Completed { result_id });
        Ok(completed)
    }

    /// Executes one step, retrying transient failures with capped
    /// exponential backoff until the attempt budget is spent.
    fn execute_with_retry(
        &self,
        index: usize,
        ctx: &mut PipelineContext,
    ) -> Result<(), StepError> {
        let mut attempt = 1;
        loop {
            match self.execute_step(index, ctx) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient step failure, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn execute_step(&self, index: usize, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let timeout = self.config.step_timeout;
        match index {
            0 => {
                let metadata = self.source.fetch_metadata(&ctx.job.video_id, timeout)?;
                ctx.metadata = Some(metadata);
            }
            1 => {
                let content =
                    self.source
                        .extract_content(&ctx.job.video_id, &ctx.job.options, timeout)?;
                ctx.content = Some(content);
            }
            2 => {
                let content = ctx
                    .content
                    .as_ref()
                    .ok_or_else(|| StepError::Permanent("no extracted content".into()))?;
                ctx.analysis = Some(self.analyzer.analyze(content, &ctx.job.options, timeout)?);
            }
            3 => {
                let analysis = ctx
                    .analysis
                    .as_ref()
                    .ok_or_else(|| StepError::Permanent("no analysis output".into()))?;
                ctx.risk = Some(self.analyzer.score_risk(analysis)?);
            }
            4 => {
                let risk = ctx
                    .risk
                    .clone()
                    .ok_or_else(|| StepError::Permanent("no risk report".into()))?;
                ctx.suggestions = self.analyzer.suggest(&risk)?;

                let metadata = ctx
                    .metadata
                    .clone()
                    .ok_or_else(|| StepError::Permanent("no video metadata".into()))?;
                let result = AnalysisResult {
                    job_id: ctx.job.id.clone(),
                    user_id: ctx.job.user_id.clone(),
                    video_id: ctx.job.video_id.clone(),
                    metadata,
                    analysis: ctx.analysis.clone().unwrap_or(serde_json::Value::Null),
                    risk,
                    suggestions: ctx.suggestions.clone(),
                };
                ctx.result_id = Some(self.results.store(&result)?);
            }
            other => {
                return Err(StepError::Permanent(format!("unknown step index {other}")));
            }
        }
        Ok(())
    }
}
