//! edge-action - Edge Platform CI Action
//!
//! Packages a directory, uploads it to an edge-computing platform and
//! deploys it to a set of edge nodes, as a sequence of workflow steps
//! driven by CI inputs.
//!
//! # Architecture
//!
//! - [`config`]: typed view of the `INPUT_*` variables
//! - [`workflow`]: step list parsing and per-step state
//! - [`package`]: file selection, `edge.json` validation and archiving
//! - [`api`]: HTTP transport, retries and the platform endpoints
//! - [`execution`]: the step engine, upload and deploy
//! - [`monitoring`]: step timing and the run summary
//! - [`outputs`]: publishing results to the runner
//!
//! # Example
//!
//! ```rust,no_run
//! use edge_action::{parse_workflow, ActionInputs, ApiClient, Engine, OutputWriter};
//!
//! #[tokio::main]
//! async fn main() -> edge_action::Result<()> {
//!     let inputs = ActionInputs::from_env()?;
//!     let workflow = parse_workflow(&inputs.workflow)?;
//!     let client = ApiClient::new(&inputs.base_url, inputs.api_token.clone())?;
//!
//!     let report = Engine::new(workflow, inputs, client).run().await;
//!     OutputWriter::from_env().write(&report.outputs())?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod outputs;
pub mod package;
pub mod workflow;

pub use api::ApiClient;
pub use config::ActionInputs;
pub use error::{ActionError, Result};
pub use execution::{Engine, RunReport};
pub use outputs::{ActionOutputs, OutputWriter};
pub use workflow::{parse_workflow, StepKind, WorkflowSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "edge-action";
