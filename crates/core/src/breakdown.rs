//! Breakdown projection: one build's nested counts to per-dimension chart data

use crate::data::{BuildId, BuildRecord, Dimension, LabelCounts, PassFail};
use crate::error::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Test outcome shown in a breakdown entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Passed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "Passed",
            Status::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{key, value}` pair consumed by pie/bar widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub key: Status,
    pub value: u64,
}

/// The Passed/Failed pair for one label, always in that order
pub type StatusPair = [BreakdownEntry; 2];

fn status_pair(counts: &PassFail) -> StatusPair {
    [
        BreakdownEntry {
            key: Status::Passed,
            value: counts.passed,
        },
        BreakdownEntry {
            key: Status::Failed,
            value: counts.failed,
        },
    ]
}

/// Per-label breakdown of a single build along one dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownView {
    pub dimension: Dimension,
    pub build: BuildId,
    #[serde(serialize_with = "serialize_entries")]
    entries: Vec<(String, StatusPair)>,
}

impl BreakdownView {
    /// Entries for one label
    pub fn get(&self, label: &str) -> Option<&StatusPair> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, e)| e)
    }

    /// Entries in source order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatusPair)> {
        self.entries.iter().map(|(l, e)| (l.as_str(), e))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    /// Number of labels; drives the panel layout
    pub fn cardinality(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn serialize_entries<S>(entries: &[(String, StatusPair)], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (label, pair) in entries {
        map.serialize_entry(label, pair)?;
    }
    map.end()
}

/// Project a label/count mapping for `build` into a breakdown view
pub fn project_counts(build: &BuildId, dimension: Dimension, counts: &LabelCounts) -> BreakdownView {
    BreakdownView {
        dimension,
        build: build.clone(),
        entries: counts
            .iter()
            .map(|(label, pf)| (label.to_string(), status_pair(pf)))
            .collect(),
    }
}

/// Project the embedded breakdown of a record
pub fn project_record(record: &BuildRecord, dimension: Dimension) -> BreakdownView {
    project_counts(&record.version, dimension, record.breakdown(dimension))
}

/// Project the breakdown of `build` from a loaded record set.
///
/// When a build id appears more than once the most recent record wins.
pub fn project_from(records: &[BuildRecord], build: &BuildId, dimension: Dimension) -> Result<BreakdownView> {
    records
        .iter()
        .rev()
        .find(|r| &r.version == build)
        .map(|r| project_record(r, dimension))
        .ok_or_else(|| Error::ProjectionError {
            build: build.to_string(),
            dimension: dimension.to_string(),
        })
}
