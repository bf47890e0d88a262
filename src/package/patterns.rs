//! Include/Exclude Pattern Matching
//!
//! Paths are matched relative to the package root using `/` separators.
//! `*` stays inside one segment and `**` crosses segments. A pattern that
//! contains no `/` is also tried against every single path component, so
//! `*.log` or `node_modules` apply at any depth. A trailing `/` marks a
//! directory: `build/out/` selects everything below `build/out`.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use log::debug;

use crate::error::{ActionError, Result};

/// Include pattern used when none are given.
pub const DEFAULT_INCLUDE: &str = "**/*";

/// A compiled list of glob patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    /// Matched against the whole relative path
    full: GlobSet,
    /// Bare patterns, matched against each path component
    component: GlobSet,
    patterns: Vec<String>,
}

impl PatternSet {
    /// Compiles a pattern list. Blank entries are ignored.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut full = GlobSetBuilder::new();
        let mut component = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for raw in patterns {
            let pattern = normalize(raw.as_ref());
            if pattern.is_empty() {
                continue;
            }

            full.add(compile(pattern)?);
            if !pattern.contains('/') {
                component.add(compile(pattern)?);
            } else if raw.as_ref().trim().ends_with('/') {
                full.add(compile(&format!("{}/**", pattern))?);
            }
            kept.push(pattern.to_string());
        }

        let build = |builder: GlobSetBuilder| {
            builder
                .build()
                .map_err(|e| ActionError::config(format!("invalid glob pattern set: {}", e)))
        };

        Ok(Self {
            full: build(full)?,
            component: build(component)?,
            patterns: kept,
        })
    }

    /// Returns true if `relative_path` matches any pattern in the set.
    pub fn matches(&self, relative_path: &str) -> bool {
        if self.full.is_match(relative_path) {
            return true;
        }
        !self.component.is_empty()
            && relative_path
                .split('/')
                .any(|part| self.component.is_match(part))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Include/exclude decision for package files.
///
/// A file is selected iff it matches at least one include pattern and no
/// exclude pattern. An empty include list means every file.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: PatternSet,
    exclude: PatternSet,
}

impl FileFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        let mut include = PatternSet::new(include)?;
        if include.is_empty() {
            include = PatternSet::new(&[DEFAULT_INCLUDE])?;
        }
        let exclude = PatternSet::new(exclude)?;

        debug!(
            "File filter: include {:?}, exclude {:?}",
            include.patterns(),
            exclude.patterns()
        );

        Ok(Self { include, exclude })
    }

    /// A filter that selects every file.
    pub fn all() -> Result<Self> {
        Self::new::<&str>(&[], &[])
    }

    pub fn is_selected(&self, relative_path: &str) -> bool {
        self.include.matches(relative_path) && !self.exclude.matches(relative_path)
    }
}

/// Splits a comma-separated pattern input into trimmed, non-empty entries.
pub fn split_patterns(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn normalize(pattern: &str) -> &str {
    let pattern = pattern.trim();
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    pattern.trim_start_matches('/').trim_end_matches('/')
}

fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ActionError::config(format!("invalid glob pattern '{}': {}", pattern, e)))
}
