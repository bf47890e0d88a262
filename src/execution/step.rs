//! Step Results
//!
//! Every step ends in a [`StepReport`]: a success/failure status, the data
//! it produced and the error that stopped it. Reports are the only thing
//! passed between steps and back to the caller.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ActionError;
use crate::workflow::StepKind;

/// Final status of a step or of a single node deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// A package registered by the upload step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub package_id: String,
    pub package_url: String,
    pub was_updated: bool,
}

/// Aggregate result across all nodes of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Partial,
    Failed,
}

impl DeployStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Result of deploying to one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentOutcome {
    pub node_id: String,
    pub deployment_id: Option<String>,
    pub status: StepStatus,
    pub error: Option<String>,
}

impl DeploymentOutcome {
    pub fn success(node_id: impl Into<String>, deployment_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            deployment_id: Some(deployment_id.into()),
            status: StepStatus::Success,
            error: None,
        }
    }

    pub fn failure(node_id: impl Into<String>, error: &ActionError) -> Self {
        Self {
            node_id: node_id.into(),
            deployment_id: None,
            status: StepStatus::Failure,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Per-node outcomes in node order plus the overall status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub outcomes: Vec<DeploymentOutcome>,
    pub overall_status: DeployStatus,
}

impl DeploymentSummary {
    /// Aggregates outcomes: all succeeded is `Success`, none is `Failed`,
    /// anything in between is `Partial`.
    pub fn from_outcomes(outcomes: Vec<DeploymentOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let overall_status = if !outcomes.is_empty() && succeeded == outcomes.len() {
            DeployStatus::Success
        } else if succeeded > 0 {
            DeployStatus::Partial
        } else {
            DeployStatus::Failed
        };

        Self {
            outcomes,
            overall_status,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Ids of the deployments that were created, in node order.
    pub fn deployment_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.deployment_id.clone())
            .collect()
    }

    /// Outcomes as a JSON object keyed by node id, in node order.
    pub fn by_node(&self) -> Value {
        let mut map = Map::new();
        for outcome in &self.outcomes {
            let mut entry = Map::new();
            entry.insert(
                "deployment_id".to_string(),
                outcome.deployment_id.clone().map_or(Value::Null, Value::from),
            );
            entry.insert("status".to_string(), Value::from(outcome.status.as_str()));
            if let Some(error) = &outcome.error {
                entry.insert("error".to_string(), Value::from(error.as_str()));
            }
            map.insert(outcome.node_id.clone(), Value::Object(entry));
        }
        Value::Object(map)
    }
}

/// Data a step hands to later steps and to the caller.
#[derive(Debug, Clone)]
pub enum StepOutput {
    Upload(UploadResult),
    Deploy(DeploymentSummary),
}

/// Outputs of earlier steps that later steps may consume.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub upload: Option<UploadResult>,
}

impl StepContext {
    pub fn record(&mut self, output: &StepOutput) {
        if let StepOutput::Upload(result) = output {
            self.upload = Some(result.clone());
        }
    }
}

/// How one step ended.
#[derive(Debug)]
pub struct StepReport {
    pub kind: StepKind,
    pub status: StepStatus,
    pub output: Option<StepOutput>,
    pub error: Option<ActionError>,
    pub duration: Duration,
}

impl StepReport {
    /// Builds a report from a step's result.
    ///
    /// A deployment that is not a full success is a failed step, but keeps
    /// its summary so per-node outcomes are still reported.
    pub fn from_result(kind: StepKind, result: Result<StepOutput, ActionError>, duration: Duration) -> Self {
        match result {
            Ok(output) => {
                let status = match &output {
                    StepOutput::Deploy(summary) if summary.overall_status != DeployStatus::Success => {
                        StepStatus::Failure
                    }
                    _ => StepStatus::Success,
                };
                Self {
                    kind,
                    status,
                    output: Some(output),
                    error: None,
                    duration,
                }
            }
            Err(error) => Self::failed(kind, error, duration),
        }
    }

    pub fn failed(kind: StepKind, error: ActionError, duration: Duration) -> Self {
        Self {
            kind,
            status: StepStatus::Failure,
            output: None,
            error: Some(error),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn upload(&self) -> Option<&UploadResult> {
        match &self.output {
            Some(StepOutput::Upload(result)) => Some(result),
            _ => None,
        }
    }

    pub fn deployment(&self) -> Option<&DeploymentSummary> {
        match &self.output {
            Some(StepOutput::Deploy(summary)) => Some(summary),
            _ => None,
        }
    }

    /// Human-readable reason for a failure, if any.
    pub fn message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.to_string());
        }
        match self.deployment() {
            Some(summary) if summary.overall_status != DeployStatus::Success => Some(format!(
                "{} of {} node deployments failed",
                summary.outcomes.len() - summary.succeeded(),
                summary.outcomes.len()
            )),
            _ => None,
        }
    }

    /// Output key/value pairs for this step.
    pub fn outputs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        match self.kind {
            StepKind::Upload => {
                out.push(("upload_status".to_string(), self.status.as_str().to_string()));
                if let Some(result) = self.upload() {
                    out.push(("upload_package_id".to_string(), result.package_id.clone()));
                    out.push(("upload_package_url".to_string(), result.package_url.clone()));
                    out.push(("upload_was_updated".to_string(), result.was_updated.to_string()));
                }
            }
            StepKind::Deploy => {
                let status = self
                    .deployment()
                    .map_or(DeployStatus::Failed, |s| s.overall_status);
                out.push(("deploy_status".to_string(), status.as_str().to_string()));
                if let Some(summary) = self.deployment() {
                    out.push((
                        "deploy_deployment_ids".to_string(),
                        Value::from(summary.deployment_ids()).to_string(),
                    ));
                    out.push((
                        "deploy_deployment_summary".to_string(),
                        summary.by_node().to_string(),
                    ));
                }
            }
            StepKind::Push => {
                out.push(("push_status".to_string(), self.status.as_str().to_string()));
            }
        }
        out
    }
}
