//! Deploy Step
//!
//! Resolves the package to deploy, then creates one deployment per node.
//! Nodes are deployed concurrently up to a fixed limit; a failure on one
//! node never stops the others, and outcomes are reported in node order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::step::{DeploymentOutcome, DeploymentSummary, UploadResult};
use crate::api::{ApiClient, PackageRef};
use crate::config::{ActionInputs, DEFAULT_DEPLOY_CONCURRENCY};
use crate::error::{ActionError, Result};

/// Deploys one package to a set of edge nodes.
pub struct DeployStep {
    client: Arc<ApiClient>,
    package: Option<PackageRef>,
    node_ids: Vec<String>,
    concurrency: usize,
    timeout: Option<Duration>,
}

impl DeployStep {
    pub fn new(client: Arc<ApiClient>, package: Option<PackageRef>, node_ids: Vec<String>) -> Self {
        Self {
            client,
            package,
            node_ids,
            concurrency: DEFAULT_DEPLOY_CONCURRENCY,
            timeout: None,
        }
    }

    pub fn from_inputs(client: Arc<ApiClient>, inputs: &ActionInputs) -> Self {
        Self::new(client, inputs.package_ref(), inputs.node_ids.clone())
            .with_concurrency(inputs.deploy_concurrency)
            .with_timeout(inputs.deploy_timeout)
    }

    /// Maximum number of deployment requests in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Overall time limit for the fan-out. Nodes still pending when it
    /// expires are reported as cancelled.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the step.
    ///
    /// `upstream` is the result of an upload earlier in the same run; when
    /// present its package id is used and no search is made. Node ids are
    /// checked before any request: malformed ids become per-node failures,
    /// and when none is usable the package is not looked up at all.
    pub async fn run(&self, upstream: Option<&UploadResult>) -> Result<DeploymentSummary> {
        let targets = node_targets(&self.node_ids);
        if targets.is_empty() {
            return Err(ActionError::config("node_ids is required for deploy workflow"));
        }

        for target in &targets {
            if let NodeTarget::Malformed(raw) = target {
                error!("Skipping node {}: not a valid UUID", raw);
            }
        }

        let outcomes = if targets.iter().any(NodeTarget::is_valid) {
            let package_id = self.resolve_package(upstream).await?;
            info!("Deploying package {} to {} node(s)", package_id, targets.len());
            self.fan_out(&package_id, &targets).await
        } else {
            warn!("No valid node ids; nothing to deploy");
            targets
                .iter()
                .map(|t| DeploymentOutcome::failure(t.id(), &t.error()))
                .collect()
        };

        let summary = DeploymentSummary::from_outcomes(outcomes);
        info!(
            "Deployment finished: {}/{} nodes succeeded ({})",
            summary.succeeded(),
            summary.outcomes.len(),
            summary.overall_status.as_str()
        );
        Ok(summary)
    }

    async fn resolve_package(&self, upstream: Option<&UploadResult>) -> Result<String> {
        if let Some(upload) = upstream {
            info!("Using package ID from upload: {}", upload.package_id);
            return Ok(upload.package_id.clone());
        }

        let reference = self.package.as_ref().ok_or_else(|| {
            ActionError::config("package_name and package_tag are required for deploy workflow")
        })?;

        info!("Looking up package {}", reference);
        let mut records = self.client.search_packages(reference).await?;
        match records.len() {
            0 => Err(ActionError::PackageNotFound {
                name: reference.name.clone(),
                tag: reference.tag.clone(),
            }),
            1 => {
                let record = records.remove(0);
                info!("Found package ID: {}", record.id);
                Ok(record.id)
            }
            count => Err(ActionError::AmbiguousPackage {
                name: reference.name.clone(),
                tag: reference.tag.clone(),
                count,
            }),
        }
    }

    async fn fan_out(&self, package_id: &str, targets: &[NodeTarget]) -> Vec<DeploymentOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut slots: Vec<Option<DeploymentOutcome>> = vec![None; targets.len()];
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().enumerate() {
            let node = match target {
                NodeTarget::Valid(node) => node.clone(),
                NodeTarget::Malformed(raw) => {
                    slots[index] = Some(DeploymentOutcome::failure(raw.as_str(), &target.error()));
                    continue;
                }
            };

            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let package_id = package_id.to_string();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, deploy_node(&client, &package_id, &node).await)
            });
        }

        join_outcomes(tasks, &mut slots, self.timeout).await;

        slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| {
                    DeploymentOutcome::failure(
                        target.id(),
                        &ActionError::Cancelled("deployment did not complete".to_string()),
                    )
                })
            })
            .collect()
    }
}

/// Waits for deployment tasks, filling `slots` by node index.
///
/// When `timeout` expires the remaining tasks are aborted. Tasks that had
/// already finished are still collected, so only unfinished nodes stay empty.
async fn join_outcomes(
    mut tasks: JoinSet<(usize, DeploymentOutcome)>,
    slots: &mut [Option<DeploymentOutcome>],
    timeout: Option<Duration>,
) {
    let collect = async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!("Deployment task did not complete: {}", e),
            }
        }
    };

    let Some(limit) = timeout else {
        collect.await;
        return;
    };

    if tokio::time::timeout(limit, collect).await.is_ok() {
        return;
    }

    warn!("Deploy timeout of {:?} reached; cancelling pending nodes", limit);
    tasks.abort_all();
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, outcome)) = joined {
            slots[index] = Some(outcome);
        }
    }
}

async fn deploy_node(client: &ApiClient, package_id: &str, node: &str) -> DeploymentOutcome {
    info!("Deploying to node: {}", node);
    match client.create_deployment(package_id, node).await {
        Ok(record) => {
            info!(
                "Deployment created for node {}. Deployment ID: {} (status: {})",
                node,
                record.id,
                record.status.as_deref().unwrap_or("unknown")
            );
            DeploymentOutcome::success(node, record.id)
        }
        Err(e) => {
            error!("Deployment failed for node {}: {}", node, e);
            DeploymentOutcome::failure(node, &e)
        }
    }
}

/// A requested deploy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTarget {
    /// Parsed UUID in hyphenated lower-case form
    Valid(String),
    /// Input that is not a UUID, kept as given
    Malformed(String),
}

impl NodeTarget {
    /// Parses one node id. Any form `uuid` accepts (braced, simple, `urn:`,
    /// upper case) is canonicalised.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Valid(id.hyphenated().to_string()),
            Err(_) => Self::Malformed(raw.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Valid(id) | Self::Malformed(id) => id,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    fn error(&self) -> ActionError {
        ActionError::InvalidNodeId(self.id().to_string())
    }
}

/// Parses node ids and drops repeats, keeping first occurrences in order.
/// Two spellings of the same UUID count as one node.
pub fn node_targets(node_ids: &[String]) -> Vec<NodeTarget> {
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(node_ids.len());
    for raw in node_ids {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let target = NodeTarget::parse(raw);
        if seen.insert(target.id().to_string()) {
            targets.push(target);
        } else {
            warn!("Duplicate node id {} ignored", raw);
        }
    }
    debug!("Deploy targets: {:?}", targets);
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Scripted, ScriptedTransport};
    use crate::api::{RetryPolicy, API_BASE_PATH};
    use crate::execution::step::{DeployStatus, StepStatus};
    use secrecy::SecretString;

    const NODE_A: &str = "6f1c1a2e-0000-4000-8000-00000000000a";
    const NODE_B: &str = "6f1c1a2e-0000-4000-8000-00000000000b";
    const NODE_C: &str = "6f1c1a2e-0000-4000-8000-00000000000c";

    fn deployments_path() -> String {
        format!("{}/deployments/", API_BASE_PATH)
    }

    fn packages_path() -> String {
        format!("{}/packages/", API_BASE_PATH)
    }

    fn client(transport: Arc<ScriptedTransport>) -> Arc<ApiClient> {
        Arc::new(
            ApiClient::with_transport(transport, SecretString::from("tok".to_string()))
                .with_policy(RetryPolicy::new(3, Duration::from_millis(1))),
        )
    }

    fn nodes(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn upstream(id: &str) -> UploadResult {
        UploadResult {
            package_id: id.to_string(),
            package_url: "https://cdn/p".to_string(),
            was_updated: false,
        }
    }

    fn created(id: &str) -> Scripted {
        Scripted::status(201, &format!(r#"{{"id": "{}", "status": "pending"}}"#, id))
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_node(NODE_A, vec![created("d-a")])
                .on_node(NODE_B, vec![Scripted::status(400, "node offline")])
                .on_node(NODE_C, vec![created("d-c")]),
        );
        let step = DeployStep::new(client(transport), None, nodes(&[NODE_A, NODE_B, NODE_C]));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Partial);

        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.node_id.as_str()).collect();
        assert_eq!(order, vec![NODE_A, NODE_B, NODE_C]);
        assert_eq!(summary.outcomes[1].status, StepStatus::Failure);
        assert!(summary.outcomes[1].error.as_deref().unwrap().contains("node offline"));
        assert_eq!(summary.deployment_ids(), vec!["d-a", "d-c"]);
    }

    #[tokio::test]
    async fn test_all_nodes_fail() {
        let transport = Arc::new(
            ScriptedTransport::new().on_path(&deployments_path(), vec![Scripted::status(404, "no such node")]),
        );
        let step = DeployStep::new(client(transport), None, nodes(&[NODE_A, NODE_B]));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Failed);
        assert!(summary.deployment_ids().is_empty());
    }

    #[tokio::test]
    async fn test_numeric_package_id_sent_as_number() {
        let transport = Arc::new(ScriptedTransport::new().on_node(NODE_A, vec![created("d-a")]));
        let step = DeployStep::new(client(transport.clone()), None, nodes(&[NODE_A]));

        step.run(Some(&upstream("12"))).await.unwrap();
        let body = transport.calls()[0].json.clone().unwrap();
        assert_eq!(body["package_id"], 12);
        assert_eq!(body["node_id"], NODE_A);
    }

    #[tokio::test]
    async fn test_malformed_node_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::new().on_node(NODE_A, vec![created("d-a")]));
        let step = DeployStep::new(client(transport.clone()), None, nodes(&["not-a-uuid", NODE_A]));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Partial);
        assert!(summary.outcomes[0].error.as_deref().unwrap().contains("not-a-uuid"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_nodes_deployed_once() {
        let transport = Arc::new(ScriptedTransport::new().on_node(NODE_A, vec![created("d-a")]));
        let step = DeployStep::new(client(transport.clone()), None, nodes(&[NODE_A, NODE_A]));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_nodes_is_config_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let step = DeployStep::new(client(transport.clone()), None, vec![]);

        let err = step.run(Some(&upstream("12"))).await.unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolves_package_by_search() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_path(
                    &packages_path(),
                    vec![Scripted::status(200, r#"[{"id": 77, "name": "sensor", "tag": "v1"}]"#)],
                )
                .on_node(NODE_A, vec![created("d-a")]),
        );
        let step = DeployStep::new(
            client(transport.clone()),
            Some(PackageRef::new("sensor", "v1")),
            nodes(&[NODE_A]),
        );

        let summary = step.run(None).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Success);
        let deploy = &transport.calls_to(&deployments_path())[0];
        assert_eq!(deploy.json.as_ref().unwrap()["package_id"], 77);
    }

    #[tokio::test]
    async fn test_package_not_found() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_path(&packages_path(), vec![Scripted::status(200, r#"{"count": 0, "results": []}"#)]),
        );
        let step = DeployStep::new(
            client(transport.clone()),
            Some(PackageRef::new("sensor", "v1")),
            nodes(&[NODE_A]),
        );

        let err = step.run(None).await.unwrap_err();
        assert!(matches!(err, ActionError::PackageNotFound { .. }));
        assert!(transport.calls_to(&deployments_path()).is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_package() {
        let transport = Arc::new(ScriptedTransport::new().on_path(
            &packages_path(),
            vec![Scripted::status(200, r#"[{"id": 1}, {"id": 2}]"#)],
        ));
        let step = DeployStep::new(
            client(transport),
            Some(PackageRef::new("sensor", "v1")),
            nodes(&[NODE_A]),
        );

        let err = step.run(None).await.unwrap_err();
        assert!(matches!(err, ActionError::AmbiguousPackage { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_timeout_cancels_slow_nodes() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_node(NODE_A, vec![created("d-a")])
                .on_node(NODE_B, vec![created("d-b").after(Duration::from_secs(30))]),
        );
        let step = DeployStep::new(client(transport), None, nodes(&[NODE_A, NODE_B]))
            .with_timeout(Some(Duration::from_millis(200)));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Partial);
        assert!(summary.outcomes[0].is_success());
        assert!(summary.outcomes[1].error.as_deref().unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_concurrency_limit_still_deploys_all() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_path(&deployments_path(), vec![created("d").after(Duration::from_millis(5))]),
        );
        let step = DeployStep::new(client(transport.clone()), None, nodes(&[NODE_A, NODE_B, NODE_C]))
            .with_concurrency(1);

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.overall_status, DeployStatus::Success);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_all_malformed_nodes_make_no_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let step = DeployStep::new(
            client(transport.clone()),
            Some(PackageRef::new("sensor", "v1")),
            nodes(&["not-a-uuid", "also-bad"]),
        );

        let summary = step.run(None).await.unwrap();
        assert_eq!(transport.call_count(), 0);
        assert_eq!(summary.overall_status, DeployStatus::Failed);
        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.node_id.as_str()).collect();
        assert_eq!(order, vec!["not-a-uuid", "also-bad"]);
        assert!(summary.outcomes[1].error.as_deref().unwrap().contains("also-bad"));
    }

    #[tokio::test]
    async fn test_malformed_node_keeps_position() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_node(NODE_A, vec![created("d-a")])
                .on_node(NODE_C, vec![created("d-c")]),
        );
        let step = DeployStep::new(client(transport.clone()), None, nodes(&[NODE_A, "bad", NODE_C]));

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.node_id.as_str()).collect();
        assert_eq!(order, vec![NODE_A, "bad", NODE_C]);
        assert!(!summary.outcomes[1].is_success());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_uuid_spellings_deploy_once_in_canonical_form() {
        let transport = Arc::new(ScriptedTransport::new().on_node(NODE_A, vec![created("d-a")]));
        let upper = NODE_A.to_uppercase();
        let braced = format!("{{{}}}", NODE_A);
        let step = DeployStep::new(
            client(transport.clone()),
            None,
            vec![upper, braced, NODE_A.to_string()],
        );

        let summary = step.run(Some(&upstream("12"))).await.unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].node_id, NODE_A);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.calls()[0].json.as_ref().unwrap()["node_id"], NODE_A);
    }

    #[tokio::test]
    async fn test_finished_tasks_kept_after_deadline() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { (0, DeploymentOutcome::success(NODE_A, "d-a")) });
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (1, DeploymentOutcome::success(NODE_B, "d-b"))
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut slots = vec![None, None];
        join_outcomes(tasks, &mut slots, Some(Duration::ZERO)).await;

        assert_eq!(slots[0].as_ref().unwrap().deployment_id.as_deref(), Some("d-a"));
        assert!(slots[1].is_none());
    }

    #[test]
    fn test_node_targets() {
        let ids = nodes(&[NODE_B, NODE_A, NODE_B, " ", "x", NODE_A, "x"]);
        assert_eq!(
            node_targets(&ids),
            vec![
                NodeTarget::Valid(NODE_B.to_string()),
                NodeTarget::Valid(NODE_A.to_string()),
                NodeTarget::Malformed("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_node_target_parse() {
        assert!(NodeTarget::parse(NODE_A).is_valid());
        let simple = NODE_A.replace('-', "");
        assert_eq!(NodeTarget::parse(&simple), NodeTarget::Valid(NODE_A.to_string()));
        assert_eq!(
            NodeTarget::parse("node-1"),
            NodeTarget::Malformed("node-1".to_string())
        );
    }
}
