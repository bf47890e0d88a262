//! edge-action Entry Point
//!
//! Runs as a CI step. All configuration arrives as `INPUT_*` environment
//! variables set by the runner:
//!
//! ```bash
//! INPUT_API_TOKEN=... INPUT_WORKFLOW=upload,deploy \
//! INPUT_PACKAGE_PATH=./edge INPUT_PACKAGE_NAME=sensor INPUT_PACKAGE_TAG=v1 \
//! INPUT_NODE_IDS=0b6b9a4e-2f61-4c43-9d8a-3f0e5d1c7a10 \
//! edge-action
//! ```
//!
//! Exits 0 only when every step succeeded.

use std::process::ExitCode;

use log::{debug, error, info};

use edge_action::{parse_workflow, ActionInputs, ApiClient, Engine, OutputWriter};
use edge_action::{APP_NAME, VERSION};

/// Configures the logging system with appropriate formatting.
fn setup_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

async fn run() -> edge_action::Result<bool> {
    let inputs = ActionInputs::from_env()?;
    setup_logging(inputs.debug);

    info!("{} v{}", APP_NAME, VERSION);
    info!("API base URL: {}", inputs.base_url);
    debug!("{:?}", inputs);

    let workflow = parse_workflow(&inputs.workflow)?;
    let client = ApiClient::new(&inputs.base_url, inputs.api_token.clone())?;

    let report = Engine::new(workflow, inputs, client).run().await;
    println!("{}", report.summary());

    OutputWriter::from_env().write(&report.outputs())?;

    if report.is_success() {
        info!("Workflow completed successfully");
    } else {
        let failed: Vec<String> = report.failed_steps().iter().map(|k| k.to_string()).collect();
        error!("Workflow failed: {}", failed.join(", "));
    }
    Ok(report.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
