//! Workflow Definition Module
//!
//! Provides the step list of a run and the per-step state machine.
//!
//! # Structure
//!
//! - [`model`]: step kinds and the ordered workflow
//! - [`parser`]: parsing of the `workflow` input
//! - [`state`]: per-step lifecycle during a run

pub mod model;
pub mod parser;
pub mod state;

pub use model::{StepKind, WorkflowSpec};
pub use parser::parse_workflow;
pub use state::{RunState, StepState};
