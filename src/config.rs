//! Action Inputs
//!
//! The runner passes every input as an `INPUT_<NAME>` environment
//! variable. Empty values count as absent.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::api::PackageRef;
use crate::error::{ActionError, Result};
use crate::package::{split_patterns, ArchiveSpec};

pub const DEFAULT_BASE_URL: &str = "https://skillx.cloud";
pub const DEFAULT_DEPLOY_CONCURRENCY: usize = 4;

/// Typed view of the action inputs.
#[derive(Clone)]
pub struct ActionInputs {
    pub api_token: SecretString,
    /// Raw comma-separated step list
    pub workflow: String,
    pub base_url: String,
    pub package_path: Option<PathBuf>,
    pub package_name: Option<String>,
    pub package_tag: Option<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Node ids as given, before de-duplication and validation
    pub node_ids: Vec<String>,
    pub deploy_concurrency: usize,
    pub deploy_timeout: Option<Duration>,
    /// Debug logging requested by the runner
    pub debug: bool,
}

impl fmt::Debug for ActionInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInputs")
            .field("api_token", &"[REDACTED]")
            .field("workflow", &self.workflow)
            .field("base_url", &self.base_url)
            .field("package_path", &self.package_path)
            .field("package_name", &self.package_name)
            .field("package_tag", &self.package_tag)
            .field("include_patterns", &self.include_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("node_ids", &self.node_ids)
            .field("deploy_concurrency", &self.deploy_concurrency)
            .field("deploy_timeout", &self.deploy_timeout)
            .finish()
    }
}

impl ActionInputs {
    /// Reads inputs from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads inputs through `lookup`, which receives full variable names
    /// such as `INPUT_API_TOKEN`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = |name: &str| {
            lookup(&format!("INPUT_{}", name.to_uppercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_token = input("api_token")
            .map(SecretString::from)
            .ok_or_else(|| ActionError::config("API token is required"))?;

        let workflow = input("workflow").ok_or_else(|| ActionError::config("Workflow is required"))?;

        let base_url = input("base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ActionError::config(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let deploy_concurrency = match input("deploy_concurrency") {
            Some(raw) => parse_positive(&raw, "deploy_concurrency")? as usize,
            None => DEFAULT_DEPLOY_CONCURRENCY,
        };

        let deploy_timeout = input("deploy_timeout")
            .map(|raw| parse_positive(&raw, "deploy_timeout").map(Duration::from_secs))
            .transpose()?;

        let debug = lookup("RUNNER_DEBUG").map_or(false, |v| v.trim() == "1");

        Ok(Self {
            api_token,
            workflow,
            base_url,
            package_path: input("package_path").map(PathBuf::from),
            package_name: input("package_name"),
            package_tag: input("package_tag"),
            include_patterns: input("include_patterns")
                .map(|v| split_patterns(&v))
                .unwrap_or_default(),
            exclude_patterns: input("exclude_patterns")
                .map(|v| split_patterns(&v))
                .unwrap_or_default(),
            node_ids: input("node_ids").map(|v| split_list(&v)).unwrap_or_default(),
            deploy_concurrency,
            deploy_timeout,
            debug,
        })
    }

    /// The `(name, tag)` pair, when both are given.
    pub fn package_ref(&self) -> Option<PackageRef> {
        match (&self.package_name, &self.package_tag) {
            (Some(name), Some(tag)) => Some(PackageRef::new(name.clone(), tag.clone())),
            _ => None,
        }
    }

    /// Archive selection for the upload step, when a package path is given.
    pub fn archive_spec(&self) -> Option<ArchiveSpec> {
        self.package_path.as_ref().map(|path| {
            ArchiveSpec::new(path.clone())
                .with_include(self.include_patterns.clone())
                .with_exclude(self.exclude_patterns.clone())
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_positive(raw: &str, name: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ActionError::config(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn inputs(pairs: &[(&str, &str)]) -> Result<ActionInputs> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ActionInputs::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_inputs_and_defaults() {
        let parsed = inputs(&[("INPUT_API_TOKEN", "tok"), ("INPUT_WORKFLOW", "upload")]).unwrap();

        assert_eq!(parsed.api_token.expose_secret(), "tok");
        assert_eq!(parsed.workflow, "upload");
        assert_eq!(parsed.base_url, DEFAULT_BASE_URL);
        assert_eq!(parsed.deploy_concurrency, DEFAULT_DEPLOY_CONCURRENCY);
        assert!(parsed.deploy_timeout.is_none());
        assert!(parsed.package_ref().is_none());
        assert!(parsed.archive_spec().is_none());
        assert!(!parsed.debug);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = inputs(&[("INPUT_WORKFLOW", "upload")]).unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));

        let err = inputs(&[("INPUT_API_TOKEN", "  "), ("INPUT_WORKFLOW", "upload")]).unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn test_missing_workflow_is_config_error() {
        let err = inputs(&[("INPUT_API_TOKEN", "tok")]).unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn test_full_inputs() {
        let parsed = inputs(&[
            ("INPUT_API_TOKEN", "tok"),
            ("INPUT_WORKFLOW", "upload,deploy"),
            ("INPUT_BASE_URL", "https://edge.example/"),
            ("INPUT_PACKAGE_PATH", "./pkg"),
            ("INPUT_PACKAGE_NAME", "sensor"),
            ("INPUT_PACKAGE_TAG", "v1"),
            ("INPUT_INCLUDE_PATTERNS", "*.sh, edge.json"),
            ("INPUT_EXCLUDE_PATTERNS", "*.log"),
            ("INPUT_NODE_IDS", " a , b,,c "),
            ("INPUT_DEPLOY_CONCURRENCY", "8"),
            ("INPUT_DEPLOY_TIMEOUT", "120"),
            ("RUNNER_DEBUG", "1"),
        ])
        .unwrap();

        assert_eq!(parsed.base_url, "https://edge.example");
        assert_eq!(parsed.package_ref(), Some(PackageRef::new("sensor", "v1")));
        assert_eq!(parsed.include_patterns, vec!["*.sh", "edge.json"]);
        assert_eq!(parsed.exclude_patterns, vec!["*.log"]);
        assert_eq!(parsed.node_ids, vec!["a", "b", "c"]);
        assert_eq!(parsed.deploy_concurrency, 8);
        assert_eq!(parsed.deploy_timeout, Some(Duration::from_secs(120)));
        assert!(parsed.debug);

        let spec = parsed.archive_spec().unwrap();
        assert_eq!(spec.source_path, PathBuf::from("./pkg"));
        assert_eq!(spec.exclude_patterns, vec!["*.log"]);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        for (key, value) in [
            ("INPUT_DEPLOY_CONCURRENCY", "0"),
            ("INPUT_DEPLOY_CONCURRENCY", "many"),
            ("INPUT_DEPLOY_TIMEOUT", "-5"),
        ] {
            let err = inputs(&[("INPUT_API_TOKEN", "t"), ("INPUT_WORKFLOW", "push"), (key, value)])
                .unwrap_err();
            assert!(matches!(err, ActionError::Config(_)), "{}={}", key, value);
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = inputs(&[
            ("INPUT_API_TOKEN", "t"),
            ("INPUT_WORKFLOW", "push"),
            ("INPUT_BASE_URL", "ftp://nope"),
        ])
        .unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let parsed = inputs(&[("INPUT_API_TOKEN", "supersecret"), ("INPUT_WORKFLOW", "push")]).unwrap();
        let rendered = format!("{:?}", parsed);
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("REDACTED"));
    }
}
