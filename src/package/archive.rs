//! Package Archive Builder
//!
//! Selects files under a source directory and writes them into a
//! gzip-compressed tar archive held in a temporary file. Entries are stored
//! relative to the package root with normalized headers, so the same tree
//! always produces the same bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::patterns::FileFilter;
use crate::error::{ActionError, Result};

/// Mode used for entries when the platform has no permission bits.
#[cfg(not(unix))]
const DEFAULT_MODE: u32 = 0o644;

/// Where to read a package from and which files to take.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    pub source_path: PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl ArchiveSpec {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn with_include(mut self, patterns: Vec<String>) -> Self {
        self.include_patterns = patterns;
        self
    }

    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Walks the source directory and returns the selected files.
    ///
    /// Fails with `Config` if the source is not a directory and with
    /// `EmptyPackage` if nothing survives filtering.
    pub fn collect(&self) -> Result<PackageTree> {
        let filter = FileFilter::new(&self.include_patterns, &self.exclude_patterns)?;
        PackageTree::scan(&self.source_path, &filter)
    }
}

/// A regular file selected for packaging.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageFile {
    /// Path inside the archive, `/`-separated, no leading `./`
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Permission bits stored in the tar header
    pub mode: u32,
}

impl PackageFile {
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// The filtered file set of a package, in deterministic order.
#[derive(Debug, Clone)]
pub struct PackageTree {
    root: PathBuf,
    files: Vec<PackageFile>,
}

impl PackageTree {
    /// Scans `root` recursively, keeping regular files selected by `filter`.
    pub fn scan(root: &Path, filter: &FileFilter) -> Result<Self> {
        if !root.exists() {
            return Err(ActionError::config(format!(
                "package path does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(ActionError::config(format!(
                "package path is not a directory: {}",
                root.display()
            )));
        }

        let mut files = Vec::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| ActionError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = relative_name(root, entry.path())?;
            if !filter.is_selected(&relative_path) {
                skipped += 1;
                continue;
            }

            let metadata = entry.metadata().map_err(|e| ActionError::Io(e.into()))?;
            files.push(PackageFile {
                relative_path,
                absolute_path: entry.path().to_path_buf(),
                mode: file_mode(&metadata),
            });
        }

        debug!(
            "Scanned {}: {} files selected, {} filtered out",
            root.display(),
            files.len(),
            skipped
        );

        if files.is_empty() {
            return Err(ActionError::EmptyPackage(root.display().to_string()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PackageFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up a file by its archive path.
    pub fn get(&self, relative_path: &str) -> Option<&PackageFile> {
        self.files.iter().find(|f| f.relative_path == relative_path)
    }
}

/// A finished archive. The temporary file is removed when this is dropped.
#[derive(Debug)]
pub struct BuiltArchive {
    file: NamedTempFile,
    entry_count: usize,
}

impl BuiltArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Reads the whole archive into memory.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        File::open(self.path())?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Writes `tree` into a new `.tar.gz` temporary file.
///
/// `label` only shapes the temporary file name.
pub fn build_archive(tree: &PackageTree, label: &str) -> Result<BuiltArchive> {
    if tree.is_empty() {
        return Err(ActionError::EmptyPackage(tree.root().display().to_string()));
    }

    let prefix = format!("{}-", sanitize_label(label));
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tar.gz")
        .tempfile()?;

    {
        let encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for file in tree.files() {
            let mut source = File::open(&file.absolute_path)?;
            let size = source.metadata()?.len();

            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(size);
            header.set_mode(file.mode);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            builder.append_data(&mut header, &file.relative_path, &mut source)?;
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?;
    }

    let size = temp.as_file().metadata()?.len();
    info!(
        "Created package archive: {} files, {} bytes",
        tree.len(),
        size
    );

    Ok(BuiltArchive {
        file: temp,
        entry_count: tree.len(),
    })
}

/// Builds the `/`-joined path of `path` relative to `root`.
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        ActionError::config(format!(
            "{} is outside of {}",
            path.display(),
            root.display()
        ))
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    DEFAULT_MODE
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() {
        "package".to_string()
    } else {
        cleaned
    }
}
