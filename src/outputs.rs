//! Step Outputs
//!
//! Publishes `name=value` pairs to the CI runner. When `GITHUB_OUTPUT`
//! names a file the pairs are appended to it, otherwise the legacy
//! `::set-output` command is printed on stdout.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use log::debug;

use crate::error::Result;

/// Delimiter for values that span several lines.
const MULTILINE_DELIMITER: &str = "EDGE_ACTION_OUTPUT_EOF";

/// Ordered output values. Setting a name twice keeps the first position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutputs {
    entries: Vec<(String, String)>,
}

impl ActionOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where outputs go.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

/// Writes [`ActionOutputs`] in the runner's format.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    target: OutputTarget,
}

impl OutputWriter {
    pub fn new(target: OutputTarget) -> Self {
        Self { target }
    }

    /// Uses the file named by `GITHUB_OUTPUT`, if set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var("GITHUB_OUTPUT") {
            Ok(path) if !path.trim().is_empty() => Self::new(OutputTarget::File(PathBuf::from(path))),
            _ => Self::new(OutputTarget::Stdout),
        }
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn write(&self, outputs: &ActionOutputs) -> Result<()> {
        match &self.target {
            OutputTarget::File(path) => {
                debug!("Writing {} outputs to {}", outputs.len(), path.display());
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                write_file_format(&mut file, outputs)?;
            }
            OutputTarget::Stdout => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                for (name, value) in outputs.iter() {
                    writeln!(handle, "::set-output name={}::{}", name, escape_command(value))?;
                }
            }
        }
        Ok(())
    }
}

fn write_file_format<W: Write>(out: &mut W, outputs: &ActionOutputs) -> io::Result<()> {
    for (name, value) in outputs.iter() {
        if value.contains('\n') {
            writeln!(out, "{}<<{}", name, MULTILINE_DELIMITER)?;
            writeln!(out, "{}", value)?;
            writeln!(out, "{}", MULTILINE_DELIMITER)?;
        } else {
            writeln!(out, "{}={}", name, value)?;
        }
    }
    Ok(())
}

/// Escapes a value for a workflow command line.
fn escape_command(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
