//! Package Building Module
//!
//! Turns a source directory into an uploadable package.
//!
//! # Structure
//!
//! - [`patterns`]: include/exclude glob matching
//! - [`archive`]: file selection and `.tar.gz` creation
//! - [`manifest`]: `edge.json` and entry script validation

pub mod archive;
pub mod manifest;
pub mod patterns;

pub use archive::{build_archive, ArchiveSpec, BuiltArchive, PackageFile, PackageTree};
pub use manifest::{validate_archive, validate_dir, validate_tree, PackageManifest, MANIFEST_FILE};
pub use patterns::{split_patterns, FileFilter, PatternSet};
