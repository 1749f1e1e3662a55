//! Single-worker pipeline.
//!
//! Extraction, then every frame strictly one at a time (upload, moderate),
//! then in-process aggregation and publishing. The whole run is bounded by
//! the configured job timeout.

use std::time::Instant;

use tokio::sync::watch;
use tracing::{warn, Instrument};

use vmod_models::{FrameLayout, JobSpec, ModerationTrigger, Report};

use crate::aggregator::aggregate;
use crate::context::PipelineContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::moderator::ModerationOutcome;
use crate::pipeline::{
    check_cancelled, download_and_extract, never_cancelled, purge_frames, upload_frame,
    with_budget,
};
use crate::scratch::ScratchDir;
use crate::state::{PipelineState, PipelineStateMachine};

const TOPOLOGY: &str = "monolithic";

pub struct MonolithicPipeline {
    ctx: PipelineContext,
    cancel_rx: watch::Receiver<bool>,
}

impl MonolithicPipeline {
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

    /// Run one job end to end and return the published report.
    ///
    /// An invalid trigger is rejected before any download or scratch
    /// directory. On failure the local scratch directory and every remote
    /// frame artifact of the job are removed.
    pub async fn run(&self, trigger: &ModerationTrigger) -> WorkerResult<Report> {
        let spec = JobSpec::resolve(trigger, &self.ctx.config.job_defaults())?;
        let logger = JobLogger::new(&spec.job_id, TOPOLOGY);
        let span = logger.create_span();

        self.run_job(&spec, &logger).instrument(span).await
    }

    async fn run_job(&self, spec: &JobSpec, logger: &JobLogger) -> WorkerResult<Report> {
        let started = Instant::now();
        logger.log_start(&spec.source, spec.sample_frequency);

        let layout = spec.layout();
        let mut machine = PipelineStateMachine::new(spec.job_id.as_str());

        let result = match ScratchDir::create(&self.ctx.config.work_dir, &spec.job_id).await {
            Ok(scratch) => {
                let result = with_budget(
                    self.ctx.config.job_timeout,
                    self.execute(spec, &layout, &scratch, &mut machine, logger),
                )
                .await;
                // Scratch goes away whatever the outcome
                scratch.close();
                result
            }
            Err(e) => Err(e),
        };

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

    async fn execute(
        &self,
        spec: &JobSpec,
        layout: &FrameLayout,
        scratch: &ScratchDir,
        machine: &mut PipelineStateMachine,
        logger: &JobLogger,
    ) -> WorkerResult<Report> {
        let frames = download_and_extract(&self.ctx, spec, scratch, &self.cancel_rx).await?;
        logger.log_extracted(frames.len());
        machine.extraction_finished(frames.len())?;

        let mut results = Vec::with_capacity(frames.len());
        let mut uploaded = Vec::with_capacity(frames.len());

        if !frames.is_empty() {
            let started = Instant::now();
            for frame in &frames {
                check_cancelled(&self.cancel_rx)?;

                let key = upload_frame(self.ctx.store.as_ref(), layout, frame).await?;
                let outcome = self
                    .ctx
                    .moderator
                    .moderate(&layout.bucket, &key, spec.min_confidence)
                    .await?;
                uploaded.push(key);

                if let ModerationOutcome::Moderated(result) = outcome {
                    results.push(result);
                }
            }
            metrics::record_stage_duration("moderating", started.elapsed().as_secs_f64());
            machine.transition(PipelineState::Aggregating)?;
        }

        let report = Report::new(spec.job_id.clone(), spec.source.clone(), aggregate(results));

        if !self.ctx.config.retain_frames && !uploaded.is_empty() {
            if let Err(e) = self.ctx.store.delete_many(&layout.bucket, &uploaded).await {
                warn!("Failed to delete uploaded frames: {}", e);
                metrics::record_cleanup_failure("remote");
            }
        }

        check_cancelled(&self.cancel_rx)?;
        machine.transition(PipelineState::Publishing)?;

        let published = self
            .ctx
            .publisher
            .publish(&report, spec.notification_topic.as_deref())
            .await?;
        if !published {
            logger.log_unpublished();
        }

        machine.transition(PipelineState::Done)?;
        Ok(report)
    }
}
