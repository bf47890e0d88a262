//! Upload Step
//!
//! Selects the package files, validates `edge.json` and its script,
//! writes a compressed archive and registers it with the platform. All
//! local checks finish before the first request is sent.

use std::io;
use std::sync::Arc;

use log::{debug, info};

use super::step::UploadResult;
use crate::api::{ApiClient, PackageRef};
use crate::config::ActionInputs;
use crate::error::{ActionError, Result};
use crate::package::{build_archive, validate_tree, ArchiveSpec, BuiltArchive, PackageManifest};

/// Builds and uploads one package.
pub struct UploadStep {
    client: Arc<ApiClient>,
    spec: Option<ArchiveSpec>,
    package: Option<PackageRef>,
}

impl UploadStep {
    pub fn new(client: Arc<ApiClient>, spec: Option<ArchiveSpec>, package: Option<PackageRef>) -> Self {
        Self {
            client,
            spec,
            package,
        }
    }

    pub fn from_inputs(client: Arc<ApiClient>, inputs: &ActionInputs) -> Self {
        Self::new(client, inputs.archive_spec(), inputs.package_ref())
    }

    /// Runs the step. The temporary archive is gone when this returns,
    /// whatever the outcome.
    pub async fn run(&self) -> Result<UploadResult> {
        let (spec, package) = match (&self.spec, &self.package) {
            (Some(spec), Some(package)) => (spec.clone(), package.clone()),
            _ => {
                return Err(ActionError::config(
                    "package_path, package_name, and package_tag are required for upload workflow",
                ))
            }
        };

        info!("Packaging {} from {}", package, spec.source_path.display());
        let label = format!("{}-{}", package.name, package.tag);
        let (manifest, archive) = tokio::task::spawn_blocking(move || prepare(&spec, &label))
            .await
            .map_err(|e| ActionError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        info!(
            "Package validated: {} files, entry script {}",
            archive.entry_count(),
            manifest.script_path
        );

        let bytes = archive.read_bytes()?;
        debug!("Archive size: {} bytes", bytes.len());

        let uploaded = self.client.upload_package(&package, bytes).await?;
        drop(archive);

        let package_url = uploaded.record.package_file.ok_or_else(|| {
            ActionError::InvalidResponse("upload response has no package_file".to_string())
        })?;

        info!("Package uploaded successfully. Package ID: {}", uploaded.record.id);
        Ok(UploadResult {
            package_id: uploaded.record.id,
            package_url,
            was_updated: uploaded.was_updated,
        })
    }
}

/// Collects, validates and archives the package on the blocking pool.
fn prepare(spec: &ArchiveSpec, label: &str) -> Result<(PackageManifest, BuiltArchive)> {
    let tree = spec.collect()?;
    let manifest = validate_tree(&tree)?;
    let archive = build_archive(&tree, label)?;
    Ok((manifest, archive))
}
