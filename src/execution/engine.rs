//! Workflow Execution Engine
//!
//! Runs the steps of a workflow one after another, in the order they were
//! listed. A failed step does not stop the run: later steps still execute
//! unless they consume the failed step's output, in which case they are
//! recorded as failed without running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use super::deploy::DeployStep;
use super::step::{StepContext, StepOutput, StepReport};
use super::upload::UploadStep;
use crate::api::ApiClient;
use crate::config::ActionInputs;
use crate::error::{ActionError, Result};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::outputs::ActionOutputs;
use crate::workflow::{RunState, StepKind, WorkflowSpec};

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use edge_action::config::ActionInputs;
/// use edge_action::execution::Engine;
/// use edge_action::workflow::parse_workflow;
/// use edge_action::ApiClient;
///
/// # async fn example() -> edge_action::Result<()> {
/// let inputs = ActionInputs::from_env()?;
/// let workflow = parse_workflow(&inputs.workflow)?;
/// let client = ApiClient::new(&inputs.base_url, inputs.api_token.clone())?;
///
/// let report = Engine::new(workflow, inputs, client).run().await;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    workflow: WorkflowSpec,
    inputs: ActionInputs,
    client: Arc<ApiClient>,
}

impl Engine {
    pub fn new(workflow: WorkflowSpec, inputs: ActionInputs, client: ApiClient) -> Self {
        Self {
            workflow,
            inputs,
            client: Arc::new(client),
        }
    }

    /// Executes every step and returns what happened.
    pub async fn run(&self) -> RunReport {
        let mut state = RunState::new(&self.workflow);
        let mut timeline = ExecutionTimeline::new();
        let mut context = StepContext::default();
        let mut steps = Vec::with_capacity(self.workflow.len());

        for (index, kind) in self.workflow.steps().iter().copied().enumerate() {
            if let Some(needed) = self.workflow.prerequisite(index) {
                if state.has_failed(needed) {
                    let reason = ActionError::DependencyFailed(needed.to_string());
                    warn!("Step '{}' {}", kind, reason);
                    state.mark_failed(kind, reason.to_string());
                    timeline.add_event(kind, EventType::Skipped);
                    steps.push(StepReport::failed(kind, reason, Duration::ZERO));
                    continue;
                }
            }

            info!("Starting step: {}", kind);
            state.mark_running(kind);
            timeline.add_event(kind, EventType::Started);

            let started = Instant::now();
            let result = self.execute(kind, &context).await;
            let report = StepReport::from_result(kind, result, started.elapsed());

            if let Some(output) = &report.output {
                context.record(output);
            }

            match report.message() {
                None => {
                    info!("Step '{}' completed successfully", kind);
                    state.mark_done(kind);
                    timeline.add_event(kind, EventType::Completed);
                }
                Some(message) => {
                    error!("Step '{}' failed: {}", kind, message);
                    state.mark_failed(kind, message);
                    timeline.add_event(kind, EventType::Failed);
                }
            }

            steps.push(report);
        }

        RunReport {
            started_at: timeline.started_at(),
            steps,
            state,
            timeline,
        }
    }

    async fn execute(&self, kind: StepKind, context: &StepContext) -> Result<StepOutput> {
        match kind {
            StepKind::Upload => UploadStep::from_inputs(Arc::clone(&self.client), &self.inputs)
                .run()
                .await
                .map(StepOutput::Upload),
            StepKind::Deploy => DeployStep::from_inputs(Arc::clone(&self.client), &self.inputs)
                .run(context.upload.as_ref())
                .await
                .map(StepOutput::Deploy),
            StepKind::Push => Err(ActionError::NotImplemented(
                "push to a container registry is not implemented yet".to_string(),
            )),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    state: RunState,
    timeline: ExecutionTimeline,
}

impl RunReport {
    /// True when every step succeeded.
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepReport> {
        self.steps.iter().find(|r| r.kind == kind)
    }

    pub fn failed_steps(&self) -> Vec<StepKind> {
        self.state.failed_steps()
    }

    /// Outputs of every step, in step order.
    pub fn outputs(&self) -> ActionOutputs {
        let mut outputs = ActionOutputs::new();
        for report in &self.steps {
            for (name, value) in report.outputs() {
                outputs.set(name, value);
            }
        }
        outputs
    }

    /// Per-step status table.
    pub fn summary(&self) -> String {
        self.timeline.summary_table()
    }
}
