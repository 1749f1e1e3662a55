//! Video moderation worker.
//!
//! This crate provides:
//! - Per-frame moderation and result aggregation
//! - The pipeline state machine shared by both topologies
//! - Monolithic and distributed (fan-out / fan-in) pipelines
//! - Stage entry points for an external workflow engine

pub mod aggregator;
pub mod config;
pub mod context;
pub mod distributed;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod moderator;
pub mod monolithic;
mod pipeline;
pub mod response;
pub mod retry;
pub mod scratch;
pub mod state;

pub use aggregator::{aggregate, ResultAggregator};
pub use config::WorkerConfig;
pub use context::PipelineContext;
pub use distributed::DistributedPipeline;
pub use error::{WorkerError, WorkerResult};
pub use fanout::FanOutRunner;
pub use handler::{dispatch, Stage};
pub use logging::JobLogger;
pub use moderator::{FrameModerator, ModerationOutcome};
pub use monolithic::MonolithicPipeline;
pub use response::HandlerResponse;
pub use retry::{retry_async_if, RetryConfig};
pub use state::{PipelineState, PipelineStateMachine};
