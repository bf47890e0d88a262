//! Workflow Parser
//!
//! Turns the comma-separated `workflow` input into a [`WorkflowSpec`].
//! Unknown names, duplicates and empty entries are configuration errors.

use std::collections::HashSet;

use log::{debug, info};

use super::model::{StepKind, WorkflowSpec};
use crate::error::{ActionError, Result};

/// Parses a workflow string such as `"upload,deploy"`.
///
/// # Example
///
/// ```
/// use edge_action::workflow::{parse_workflow, StepKind};
///
/// let spec = parse_workflow("upload, deploy").unwrap();
/// assert_eq!(spec.steps(), &[StepKind::Upload, StepKind::Deploy]);
/// ```
pub fn parse_workflow(input: &str) -> Result<WorkflowSpec> {
    if input.trim().is_empty() {
        return Err(ActionError::config("Workflow is required"));
    }

    let mut steps = Vec::new();
    let mut seen: HashSet<StepKind> = HashSet::new();

    for (index, raw) in input.split(',').enumerate() {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ActionError::config(format!(
                "Workflow entry {} is empty in '{}'",
                index + 1,
                input
            )));
        }

        let kind: StepKind = name.parse().map_err(ActionError::Config)?;
        if !seen.insert(kind) {
            return Err(ActionError::config(format!(
                "Workflow step '{}' is listed more than once",
                kind
            )));
        }

        debug!("Workflow step {}: {}", index + 1, kind);
        steps.push(kind);
    }

    let spec = WorkflowSpec::from_steps(steps);
    info!("Executing workflow steps: {}", spec);
    Ok(spec)
}
