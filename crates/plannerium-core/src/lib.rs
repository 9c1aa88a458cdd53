//! Core planning pipeline: turns a goal, a date range and a weekly hour
//! budget into a cross-referenced project plan by chaining five calls to a
//! text generator.

pub mod chat;
pub mod export;
pub mod generator;
pub mod integrity;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod stages;
pub mod stats;

pub use generator::{GenerationUnavailable, Generator};
pub use model::{Plan, PlanRequest, RequestError};
pub use pipeline::{PipelineFailed, PipelineOptions, PipelineState, run_pipeline};
pub use response::MalformedResponse;
pub use stages::{Stage, StageError};
