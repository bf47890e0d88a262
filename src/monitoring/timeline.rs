//! Execution Timeline
//!
//! Records when each workflow step starts and how it ends, and renders
//! the end-of-run summary table.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::workflow::StepKind;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step began running
    Started,
    /// Step finished successfully
    Completed,
    /// Step returned an error
    Failed,
    /// Not run because a prerequisite failed
    Skipped,
}

impl EventType {
    fn is_final(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Step the event belongs to
    pub step: StepKind,
    pub event_type: EventType,
    /// When the event was recorded
    pub timestamp: Instant,
}

/// How one step ended, as seen by the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTiming {
    pub step: StepKind,
    /// Final event for the step
    pub outcome: EventType,
    /// Time from start to final event; zero for skipped steps
    pub duration: Duration,
}

/// Tracks the execution timeline of a workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step: StepKind, event_type: EventType) {
        self.events.push(TimelineEvent {
            step,
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Wall-clock time the run began.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Final outcome and duration of every step that ended, in the order
    /// the steps first appeared. A skipped step has zero duration.
    pub fn timings(&self) -> Vec<StepTiming> {
        let mut timings: Vec<StepTiming> = Vec::new();
        let mut starts: Vec<(StepKind, Instant)> = Vec::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => starts.push((event.step, event.timestamp)),
                outcome => {
                    let duration = starts
                        .iter()
                        .find(|(step, _)| *step == event.step)
                        .map(|(_, start)| event.timestamp.duration_since(*start))
                        .unwrap_or_default();
                    timings.retain(|t| t.step != event.step);
                    timings.push(StepTiming {
                        step: event.step,
                        outcome,
                        duration,
                    });
                }
            }
        }

        timings
    }

    /// Renders the per-step summary printed at the end of a run.
    pub fn summary_table(&self) -> String {
        let mut output = String::from("\nWorkflow Summary:\n\n");

        for timing in self.timings() {
            let status = match timing.outcome {
                EventType::Completed => "DONE".green(),
                EventType::Failed => "FAILED".red(),
                EventType::Skipped => "SKIPPED".yellow(),
                EventType::Started => "RUNNING".normal(),
            };
            output.push_str(&format!(
                "  {:8} {:>7}  ({} ms)\n",
                timing.step.name(),
                status,
                timing.duration.as_millis()
            ));
        }

        let finished = self.events.iter().filter(|e| e.event_type.is_final()).count();
        output.push_str(&format!(
            "\n{} step(s) finished in {} ms\n",
            finished,
            self.elapsed().as_millis()
        ));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}
