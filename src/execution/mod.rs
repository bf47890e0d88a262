//! Workflow Execution Module
//!
//! Runs the steps of a workflow against the platform API.
//!
//! # Architecture
//!
//! - [`engine`]: sequential runner and the final [`RunReport`]
//! - [`step`]: step results and their output values
//! - [`upload`]: package, validate and upload
//! - [`deploy`]: package resolution and the per-node fan-out

pub mod deploy;
pub mod engine;
pub mod step;
pub mod upload;

pub use deploy::DeployStep;
pub use engine::{Engine, RunReport};
pub use step::{
    DeployStatus, DeploymentOutcome, DeploymentSummary, StepOutput, StepReport, StepStatus,
    UploadResult,
};
pub use upload::UploadStep;
