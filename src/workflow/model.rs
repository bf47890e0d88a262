//! Workflow Data Model
//!
//! A workflow is an ordered list of named steps, for example
//! `upload,deploy`. Steps run left to right; the only structural data
//! dependency is `deploy` on an earlier `upload`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The steps the action knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Publish to a container registry (not implemented)
    Push,
    /// Build, validate and upload a package
    Upload,
    /// Deploy a package to edge nodes
    Deploy,
}

impl StepKind {
    pub const ALL: [StepKind; 3] = [StepKind::Push, StepKind::Upload, StepKind::Deploy];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Upload => "upload",
            Self::Deploy => "deploy",
        }
    }

    /// The step whose output this step consumes when both run together.
    pub fn depends_on(&self) -> Option<StepKind> {
        match self {
            Self::Deploy => Some(Self::Upload),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                format!(
                    "Invalid workflow step: {}. Valid steps: {}",
                    wanted,
                    valid.join(", ")
                )
            })
    }
}

/// An ordered, duplicate-free list of steps. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    steps: Vec<StepKind>,
}

impl WorkflowSpec {
    /// Wraps an already validated step list. Use
    /// [`parse_workflow`](super::parser::parse_workflow) for user input.
    pub(crate) fn from_steps(steps: Vec<StepKind>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.steps.contains(&kind)
    }

    pub fn position(&self, kind: StepKind) -> Option<usize> {
        self.steps.iter().position(|k| *k == kind)
    }

    /// The earlier step that the step at `index` takes its input from, if
    /// that step is part of this workflow and listed before it.
    pub fn prerequisite(&self, index: usize) -> Option<StepKind> {
        let kind = *self.steps.get(index)?;
        let needed = kind.depends_on()?;
        self.steps[..index].contains(&needed).then_some(needed)
    }
}

impl fmt::Display for WorkflowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|k| k.name()).collect();
        f.write_str(&names.join(","))
    }
}
