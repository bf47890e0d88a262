//! Error Taxonomy
//!
//! Every failure the action can report is a variant of [`ActionError`].
//! Steps convert these into per-step statuses; nothing here ever carries
//! the API token.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ActionError>;

/// All errors surfaced by the action.
#[derive(Error, Debug)]
pub enum ActionError {
    /// Bad or missing inputs. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no files matched the include/exclude patterns under '{0}'")]
    EmptyPackage(String),

    #[error("edge.json file not found at root level of package")]
    ManifestMissing,

    #[error("invalid edge.json: {0}")]
    ManifestInvalid(String),

    #[error("script file '{0}' not found in package")]
    ScriptMissing(String),

    #[error("script '{0}' must end in .sh/.bash or be executable")]
    ScriptType(String),

    /// 401/403 from the platform. Never retried.
    #[error("authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected API response: {0}")]
    InvalidResponse(String),

    #[error("package not found: {name}:{tag}")]
    PackageNotFound { name: String, tag: String },

    #[error("package {name}:{tag} is ambiguous ({count} matches)")]
    AmbiguousPackage {
        name: String,
        tag: String,
        count: usize,
    },

    #[error("malformed node id '{0}'")]
    InvalidNodeId(String),

    #[error("skipped because step '{0}' failed")]
    DependencyFailed(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActionError {
    /// Returns true for failures worth another attempt: network-level
    /// errors, HTTP 5xx and HTTP 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true for manifest and script validation failures.
    pub fn is_package_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyPackage(_)
                | Self::ManifestMissing
                | Self::ManifestInvalid(_)
                | Self::ScriptMissing(_)
                | Self::ScriptType(_)
        )
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
