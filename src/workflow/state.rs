//! Workflow Run State
//!
//! Tracks each step of one invocation through
//! `PENDING -> RUNNING -> {DONE, FAILED}`. Nothing is persisted; every run
//! starts fresh.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::model::{StepKind, WorkflowSpec};

/// Lifecycle of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Pending,
    Running,
    Done,
    /// Failed or not run because a prerequisite failed
    Failed(String),
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Running => f.write_str("RUNNING"),
            Self::Done => f.write_str("DONE"),
            Self::Failed(_) => f.write_str("FAILED"),
        }
    }
}

/// State of every step in one run, in workflow order.
#[derive(Debug, Clone)]
pub struct RunState {
    steps: Vec<(StepKind, StepState)>,
}

impl RunState {
    /// Creates a state with every step pending.
    pub fn new(workflow: &WorkflowSpec) -> Self {
        Self {
            steps: workflow
                .steps()
                .iter()
                .map(|kind| (*kind, StepState::Pending))
                .collect(),
        }
    }

    pub fn state(&self, kind: StepKind) -> Option<&StepState> {
        self.steps.iter().find(|(k, _)| *k == kind).map(|(_, s)| s)
    }

    pub fn mark_running(&mut self, kind: StepKind) {
        self.set(kind, StepState::Running);
    }

    pub fn mark_done(&mut self, kind: StepKind) {
        self.set(kind, StepState::Done);
    }

    pub fn mark_failed(&mut self, kind: StepKind, reason: impl Into<String>) {
        self.set(kind, StepState::Failed(reason.into()));
    }

    /// True if `kind` reached `FAILED`.
    pub fn has_failed(&self, kind: StepKind) -> bool {
        matches!(self.state(kind), Some(StepState::Failed(_)))
    }

    /// Steps that ended in `FAILED`, in workflow order.
    pub fn failed_steps(&self) -> Vec<StepKind> {
        self.steps
            .iter()
            .filter(|(_, s)| matches!(s, StepState::Failed(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    /// True once every step is terminal and none failed.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|(_, s)| *s == StepState::Done)
    }

    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(|(_, s)| s.is_terminal())
    }

    fn set(&mut self, kind: StepKind, state: StepState) {
        if let Some(entry) = self.steps.iter_mut().find(|(k, _)| *k == kind) {
            debug!("Step '{}': {} -> {}", kind, entry.1, state);
            entry.1 = state;
        }
    }
}
