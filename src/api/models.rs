//! Platform API Records
//!
//! Only the fields the action reads are modelled; everything else in the
//! platform's JSON is ignored.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a package on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub tag: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// File name used for the uploaded archive.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.tag)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// A package as returned by the packages endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    /// Download URL of the stored archive
    #[serde(default)]
    pub package_file: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tag: Option<String>,
}

impl PackageRecord {
    /// False only when the record names a different package than `reference`.
    pub fn matches(&self, reference: &PackageRef) -> bool {
        self.name.as_deref().map_or(true, |n| n == reference.name)
            && self.tag.as_deref().map_or(true, |t| t == reference.tag)
    }
}

/// Search results: either the paginated `{count, results}` shape or a
/// bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PackageListing {
    Paged {
        #[serde(default)]
        count: Option<u64>,
        results: Vec<PackageRecord>,
    },
    Plain(Vec<PackageRecord>),
}

impl PackageListing {
    /// Total match count reported by the server, if paginated.
    pub fn total(&self) -> Option<u64> {
        match self {
            Self::Paged { count, .. } => *count,
            Self::Plain(records) => Some(records.len() as u64),
        }
    }

    pub fn into_records(self) -> Vec<PackageRecord> {
        match self {
            Self::Paged { results, .. } => results,
            Self::Plain(records) => records,
        }
    }
}

/// A deployment as returned by the deployments endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// JSON value for a package id: numeric ids go out as numbers.
pub fn package_id_value(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

/// Accepts an id given either as a JSON string or a JSON number.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(de::Error::custom("expected a non-empty string or number id")),
    }
}
