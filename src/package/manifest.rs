//! Package Manifest Validation
//!
//! Every package carries an `edge.json` at its root naming the entry
//! script:
//!
//! ```json
//! { "script_path": "run.sh" }
//! ```
//!
//! The script must be part of the package and either end in `.sh`/`.bash`
//! or carry an executable permission bit.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::archive::PackageTree;
use super::patterns::FileFilter;
use crate::error::{ActionError, Result};

/// Manifest file name, always at the package root.
pub const MANIFEST_FILE: &str = "edge.json";

/// Extensions accepted for non-executable entry scripts.
const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash"];

/// Parsed contents of `edge.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackageManifest {
    /// Entry script, relative to the package root
    pub script_path: String,
}

impl PackageManifest {
    /// Parses manifest bytes. Unknown keys are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ActionError::ManifestInvalid(format!("invalid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| ActionError::ManifestInvalid("expected a JSON object".to_string()))?;

        let script = match object.get("script_path") {
            None => {
                return Err(ActionError::ManifestInvalid(
                    "edge.json must contain 'script_path' key".to_string(),
                ))
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(ActionError::ManifestInvalid(
                    "'script_path' must be a string".to_string(),
                ))
            }
        };

        Ok(Self {
            script_path: normalize_script_path(script)?,
        })
    }
}

/// Validates the files selected for a package before it is archived.
///
/// Only files in `tree` count: a manifest or script removed by the
/// exclude patterns is reported as missing.
pub fn validate_tree(tree: &PackageTree) -> Result<PackageManifest> {
    let manifest_file = tree.get(MANIFEST_FILE).ok_or(ActionError::ManifestMissing)?;
    let bytes = fs::read(&manifest_file.absolute_path)?;
    let manifest = PackageManifest::parse(&bytes)?;

    check_script(&manifest, |path| tree.get(path).map(|f| f.mode))?;

    info!(
        "Package structure valid (entry script: {})",
        manifest.script_path
    );
    Ok(manifest)
}

/// Validates every file under `root`, without any pattern filtering.
pub fn validate_dir(root: &Path) -> Result<PackageManifest> {
    let tree = PackageTree::scan(root, &FileFilter::all()?)?;
    validate_tree(&tree)
}

/// Validates an already built `.tar.gz` package.
pub fn validate_archive(path: &Path) -> Result<PackageManifest> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut modes: HashMap<String, u32> = HashMap::new();
    let mut manifest_bytes: Option<Vec<u8>> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw = entry.path()?.to_string_lossy().to_string();
        let name = raw.strip_prefix("./").unwrap_or(&raw).to_string();
        let mode = entry.header().mode()?;

        if name == MANIFEST_FILE {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            manifest_bytes = Some(bytes);
        }
        modes.insert(name, mode);
    }

    debug!("Archive {} holds {} files", path.display(), modes.len());

    let bytes = manifest_bytes.ok_or(ActionError::ManifestMissing)?;
    let manifest = PackageManifest::parse(&bytes)?;
    check_script(&manifest, |p| modes.get(p).copied())?;
    Ok(manifest)
}

/// Checks that the entry script exists and is runnable.
///
/// `lookup` returns the permission bits of a package file, or `None` if
/// the package does not contain it.
fn check_script<F>(manifest: &PackageManifest, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<u32>,
{
    let script = manifest.script_path.as_str();
    let mode = lookup(script).ok_or_else(|| ActionError::ScriptMissing(script.to_string()))?;

    if has_script_extension(script) || mode & 0o111 != 0 {
        Ok(())
    } else {
        Err(ActionError::ScriptType(script.to_string()))
    }
}

fn has_script_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| SCRIPT_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Strips a leading `./` and rejects paths that leave the package root.
fn normalize_script_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let path = trimmed.strip_prefix("./").unwrap_or(trimmed);

    if path.is_empty() {
        return Err(ActionError::ManifestInvalid(
            "script_path cannot be empty".to_string(),
        ));
    }
    if path.starts_with('/') || path.split('/').any(|part| part == "..") {
        return Err(ActionError::ManifestInvalid(format!(
            "script_path '{}' must be relative to the package root",
            raw
        )));
    }

    Ok(path.to_string())
}
