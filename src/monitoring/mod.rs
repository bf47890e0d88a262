//! Run Monitoring Module
//!
//! Tracks step timing during a workflow run and renders the summary
//! printed when the run ends.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: step start/end events and the summary table

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepTiming, TimelineEvent};
