//! Stage entry points.
//!
//! Each stage takes one JSON event and answers with a [`HandlerResponse`], so
//! an external workflow engine can call the distributed stages one by one.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::info;

use vmod_models::{ModerateFrameTask, ModerationTrigger, StageHandoff};

use crate::context::PipelineContext;
use crate::distributed::DistributedPipeline;
use crate::error::{WorkerError, WorkerResult};
use crate::monolithic::MonolithicPipeline;
use crate::response::HandlerResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Whole job in one worker
    Monolithic,
    /// Whole job with in-process fan-out
    Distributed,
    /// Trigger in, hand-off out
    Capture,
    /// Frame task in, moderation outcome out
    Moderate,
    /// Hand-off in, report out
    Consolidate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Monolithic => "monolithic",
            Stage::Distributed => "distributed",
            Stage::Capture => "capture",
            Stage::Moderate => "moderate",
            Stage::Consolidate => "consolidate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monolithic" => Ok(Stage::Monolithic),
            "distributed" => Ok(Stage::Distributed),
            "capture" | "capture_frames" => Ok(Stage::Capture),
            "moderate" | "moderate_frame" => Ok(Stage::Moderate),
            "consolidate" => Ok(Stage::Consolidate),
            other => Err(WorkerError::validation(format!("Unknown stage: {}", other))),
        }
    }
}

/// Run `stage` over the JSON event `input`.
pub async fn dispatch(
    ctx: PipelineContext,
    stage: Stage,
    input: &str,
    cancel_rx: watch::Receiver<bool>,
) -> HandlerResponse {
    info!(stage = %stage, "Dispatching event");

    match stage {
        Stage::Monolithic => {
            let pipeline = MonolithicPipeline::new(ctx).with_cancel(cancel_rx);
            match ModerationTrigger::from_json(input) {
                Ok(trigger) => HandlerResponse::from_result(pipeline.run(&trigger).await),
                Err(e) => HandlerResponse::from_error(&WorkerError::from(e)),
            }
        }
        Stage::Distributed => {
            let pipeline = DistributedPipeline::new(ctx).with_cancel(cancel_rx);
            match ModerationTrigger::from_json(input) {
                Ok(trigger) => HandlerResponse::from_result(pipeline.run(&trigger).await),
                Err(e) => HandlerResponse::from_error(&WorkerError::from(e)),
            }
        }
        Stage::Capture => {
            let pipeline = DistributedPipeline::new(ctx).with_cancel(cancel_rx);
            match ModerationTrigger::from_json(input) {
                Ok(trigger) => HandlerResponse::from_result(pipeline.capture_frames(&trigger).await),
                Err(e) => HandlerResponse::from_error(&WorkerError::from(e)),
            }
        }
        Stage::Moderate => {
            let pipeline = DistributedPipeline::new(ctx).with_cancel(cancel_rx);
            match parse_event::<ModerateFrameTask>(input, "frame task") {
                Ok(task) => HandlerResponse::from_result(pipeline.moderate_frame(&task).await),
                Err(e) => HandlerResponse::from_error(&e),
            }
        }
        Stage::Consolidate => {
            let pipeline = DistributedPipeline::new(ctx).with_cancel(cancel_rx);
            match parse_event::<StageHandoff>(input, "hand-off") {
                Ok(handoff) => HandlerResponse::from_result(pipeline.consolidate(&handoff).await),
                Err(e) => HandlerResponse::from_error(&e),
            }
        }
    }
}

fn parse_event<T: DeserializeOwned>(input: &str, what: &str) -> WorkerResult<T> {
    serde_json::from_str(input)
        .map_err(|e| WorkerError::validation(format!("Malformed {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("monolithic".parse::<Stage>().unwrap(), Stage::Monolithic);
        assert_eq!("Distributed".parse::<Stage>().unwrap(), Stage::Distributed);
        assert_eq!("capture_frames".parse::<Stage>().unwrap(), Stage::Capture);
        assert_eq!("moderate".parse::<Stage>().unwrap(), Stage::Moderate);
        assert_eq!(" consolidate ".parse::<Stage>().unwrap(), Stage::Consolidate);

        let err = "render".parse::<Stage>().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_parse_event_rejects_malformed_task() {
        let err = parse_event::<ModerateFrameTask>("{\"bucket\": 1}", "frame task").unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));

        let task: ModerateFrameTask =
            parse_event(r#"{"s3_bucket":"b","s3_key":"f/v.mp4/0.png"}"#, "frame task").unwrap();
        assert_eq!(task.bucket, "b");
        assert_eq!(task.min_confidence, None);
    }
}
