//! Fan-out / fan-in pipeline.
//!
//! Three stages that an external workflow engine can invoke one by one:
//! capture uploads every frame and returns a [`StageHandoff`], one moderation
//! unit runs per frame, and consolidation gathers the units' records into the
//! report. [`DistributedPipeline::run`] drives all three in-process.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, Instrument};

use vmod_models::layout::record_key_for_image;
use vmod_models::{
    FrameLayout, JobSpec, ModerateFrameTask, ModerationTrigger, Report, StageHandoff,
};

use crate::context::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::fanout::FanOutRunner;
use crate::logging::JobLogger;
use crate::metrics;
use crate::moderator::ModerationOutcome;
use crate::pipeline::{
    check_cancelled, download_and_extract, never_cancelled, purge_frames, upload_frame,
    with_budget,
};
use crate::scratch::ScratchDir;
use crate::state::{PipelineState, PipelineStateMachine};

const TOPOLOGY: &str = "distributed";

#[derive(Clone)]
pub struct DistributedPipeline {
    ctx: PipelineContext,
    cancel_rx: watch::Receiver<bool>,
}

impl DistributedPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            cancel_rx: never_cancelled(),
        }
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = cancel_rx;
        self
    }

    /// Capture stage: extract and upload every frame.
    ///
    /// Local scratch is cleared before returning. On failure every frame
    /// uploaded so far is removed.
    pub async fn capture_frames(&self, trigger: &ModerationTrigger) -> WorkerResult<StageHandoff> {
        let spec = JobSpec::resolve(trigger, &self.ctx.config.job_defaults())?;
        let logger = JobLogger::new(&spec.job_id, "capture_frames");

        async {
            logger.log_start(&spec.source, spec.sample_frequency);

            let result = with_budget(self.ctx.config.job_timeout, self.capture(&spec)).await;
            match result {
                Ok(frame_keys) => {
                    logger.log_uploaded(frame_keys.len());
                    Ok(StageHandoff::new(&spec, frame_keys))
                }
                Err(e) => {
                    purge_frames(self.ctx.store.as_ref(), &spec.layout()).await;
                    logger.log_failed(&e);
                    Err(e)
                }
            }
        }
        .instrument(logger.create_span())
        .await
    }

    /// Moderation unit: classify one frame and persist its record.
    ///
    /// A flagged frame gets a `.json` record next to its image. A frame with
    /// no qualifying labels has its image deleted since nothing downstream
    /// reads it.
    pub async fn moderate_frame(&self, task: &ModerateFrameTask) -> WorkerResult<ModerationOutcome> {
        let min_confidence = task.threshold()?;
        let outcome = self
            .ctx
            .moderator
            .moderate(&task.bucket, &task.key, min_confidence)
            .await?;

        match &outcome {
            ModerationOutcome::Moderated(result) if result.is_flagged() => {
                let record_key = record_key_for_image(&task.key).ok_or_else(|| {
                    WorkerError::validation(format!("Not a frame image key: {}", task.key))
                })?;
                let body = serde_json::to_vec(result)
                    .map_err(|e| WorkerError::TaskFailed(format!("Failed to encode record: {}", e)))?;
                self.ctx
                    .store
                    .put_bytes(&task.bucket, &record_key, body, "application/json")
                    .await?;
                debug!("Wrote record {}", record_key);
            }
            ModerationOutcome::Moderated(_) => {
                self.ctx.store.delete(&task.bucket, &task.key).await?;
                debug!("No labels for {}, image removed", task.key);
            }
            ModerationOutcome::Skipped => {}
        }

        Ok(outcome)
    }

    /// Consolidation stage: gather the records and publish the report.
    ///
    /// A hand-off whose folder is not the job's own is rejected before any
    /// object is touched. On a later failure the job's frame folder is removed.
    pub async fn consolidate(&self, handoff: &StageHandoff) -> WorkerResult<Report> {
        let spec = handoff.job_spec()?;
        let layout = handoff.layout()?;
        let logger = JobLogger::new(&spec.job_id, "consolidate");

        async {
            logger.log_start(&spec.source, spec.sample_frequency);

            let result = with_budget(
                self.ctx.config.job_timeout,
                self.consolidate_and_publish(&spec, &layout, None),
            )
            .await;

            match result {
                Ok(report) => {
                    logger.log_report(&report);
                    Ok(report)
                }
                Err(e) => {
                    purge_frames(self.ctx.store.as_ref(), &layout).await;
                    logger.log_failed(&e);
                    Err(e)
                }
            }
        }
        .instrument(logger.create_span())
        .await
    }

    /// Run all three stages, fanning moderation out in-process.
    ///
    /// Consolidation starts only after every unit has completed. A unit that
    /// exhausts its retries fails the job.
    pub async fn run(&self, trigger: &ModerationTrigger) -> WorkerResult<Report> {
        let spec = JobSpec::resolve(trigger, &self.ctx.config.job_defaults())?;
        let logger = JobLogger::new(&spec.job_id, TOPOLOGY);

        async {
            let started = Instant::now();
            logger.log_start(&spec.source, spec.sample_frequency);

            let layout = spec.layout();
            let mut machine = PipelineStateMachine::new(spec.job_id.as_str());

            let result = with_budget(
                self.ctx.config.job_timeout,
                self.execute(&spec, &layout, &mut machine, &logger),
            )
            .await;

            match result {
                Ok(report) => {
                    metrics::record_job_completed(TOPOLOGY, started.elapsed().as_secs_f64());
                    logger.log_report(&report);
                    Ok(report)
                }
                Err(e) => {
                    machine.fail();
                    purge_frames(self.ctx.store.as_ref(), &layout).await;
                    metrics::record_job_failed(TOPOLOGY, e.kind());
                    logger.log_failed(&e);
                    Err(e)
                }
            }
        }
        .instrument(logger.create_span())
        .await
    }

    async fn execute(
        &self,
        spec: &JobSpec,
        layout: &FrameLayout,
        machine: &mut PipelineStateMachine,
        logger: &JobLogger,
    ) -> WorkerResult<Report> {
        let frame_keys = self.capture(spec).await?;
        logger.log_uploaded(frame_keys.len());
        machine.extraction_finished(frame_keys.len())?;

        if !frame_keys.is_empty() {
            let handoff = StageHandoff::new(spec, frame_keys);
            let runner = FanOutRunner::new(self.ctx.config.max_fanout, self.ctx.config.unit_retry())
                .with_cancel(self.cancel_rx.clone());

            let started = Instant::now();
            let pipeline = self.clone();
            runner
                .run(handoff.moderation_tasks(), move |task: Arc<ModerateFrameTask>| {
                    let pipeline = pipeline.clone();
                    async move { pipeline.moderate_frame(&task).await }
                })
                .await?;
            metrics::record_stage_duration("moderating", started.elapsed().as_secs_f64());

            machine.transition(PipelineState::Aggregating)?;
        }

        check_cancelled(&self.cancel_rx)?;
        self.consolidate_and_publish(spec, layout, Some(machine)).await
    }

    /// Download, extract and upload. Returns the uploaded frame keys in
    /// sequence order.
    async fn capture(&self, spec: &JobSpec) -> WorkerResult<Vec<String>> {
        let scratch = ScratchDir::create(&self.ctx.config.work_dir, &spec.job_id).await?;
        let result = self.upload_all(spec, &scratch).await;
        scratch.close();
        result
    }

    async fn upload_all(&self, spec: &JobSpec, scratch: &ScratchDir) -> WorkerResult<Vec<String>> {
        let frames = download_and_extract(&self.ctx, spec, scratch, &self.cancel_rx).await?;
        let layout = spec.layout();

        let started = Instant::now();
        let mut keys = Vec::with_capacity(frames.len());
        for frame in &frames {
            check_cancelled(&self.cancel_rx)?;
            keys.push(upload_frame(self.ctx.store.as_ref(), &layout, frame).await?);
        }
        metrics::record_stage_duration("uploading", started.elapsed().as_secs_f64());

        Ok(keys)
    }

    async fn consolidate_and_publish(
        &self,
        spec: &JobSpec,
        layout: &FrameLayout,
        mut machine: Option<&mut PipelineStateMachine>,
    ) -> WorkerResult<Report> {
        let started = Instant::now();
        let results = self.ctx.aggregator.consolidate(layout).await?;
        let report = Report::new(spec.job_id.clone(), spec.source.clone(), results);
        metrics::record_stage_duration("aggregating", started.elapsed().as_secs_f64());

        if let Some(machine) = machine.as_deref_mut() {
            machine.transition(PipelineState::Publishing)?;
        }

        self.ctx
            .publisher
            .publish(&report, spec.notification_topic.as_deref())
            .await?;

        if let Some(machine) = machine {
            machine.transition(PipelineState::Done)?;
        }
        Ok(report)
    }
}
