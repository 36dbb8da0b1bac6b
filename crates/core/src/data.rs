//! Data model for build records, time series and breakdown payloads

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Opaque build identifier, typically a build number such as `"2.5.0-1200"`
///
/// Accepts both JSON strings and JSON numbers on the wire and always
/// serializes back as a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BuildId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for BuildId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BuildId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => BuildId(s),
            RawId::Unsigned(n) => BuildId(n.to_string()),
            RawId::Signed(n) => BuildId(n.to_string()),
            RawId::Float(n) => BuildId(n.to_string()),
        })
    }
}

/// Breakdown dimension of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Platform,
    Priority,
    Category,
}

impl Dimension {
    /// All dimensions in panel order
    pub const ALL: [Dimension; 3] = [Dimension::Platform, Dimension::Priority, Dimension::Category];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Platform => "platform",
            Dimension::Priority => "priority",
            Dimension::Category => "category",
        }
    }

    /// Name of the on-demand breakdown endpoint for this dimension
    pub fn endpoint(&self) -> &'static str {
        match self {
            Dimension::Platform => "by_platform",
            Dimension::Priority => "by_priority",
            Dimension::Category => "by_category",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(Dimension::Platform),
            "priority" => Ok(Dimension::Priority),
            "category" => Ok(Dimension::Category),
            other => Err(Error::UnknownDimension(other.to_string())),
        }
    }
}

/// Passed/failed test counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassFail {
    pub passed: u64,
    pub failed: u64,
}

impl PassFail {
    pub fn new(passed: u64, failed: u64) -> Self {
        Self { passed, failed }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }
}

/// Ordered mapping from dimension label to counts
///
/// Iteration order is the order labels appear in the source document.
/// Labels are unique; a duplicate label is rejected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelCounts(Vec<(String, PassFail)>);

impl LabelCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label, replacing the counts in place if it already exists
    pub fn insert(&mut self, label: impl Into<String>, counts: PassFail) {
        let label = label.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = counts,
            None => self.0.push((label, counts)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&PassFail> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PassFail)> {
        self.0.iter().map(|(l, c)| (l.as_str(), c))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, PassFail)> for LabelCounts {
    fn from_iter<I: IntoIterator<Item = (S, PassFail)>>(iter: I) -> Self {
        let mut entries: Vec<(String, PassFail)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (label, pf) in iter {
            let label = label.into();
            match index.get(&label) {
                Some(&i) => entries[i].1 = pf,
                None => {
                    index.insert(label.clone(), entries.len());
                    entries.push((label, pf));
                }
            }
        }
        LabelCounts(entries)
    }
}

impl Serialize for LabelCounts {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, counts) in &self.0 {
            map.serialize_entry(label, counts)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelCounts {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LabelCountsVisitor;

        impl<'de> Visitor<'de> for LabelCountsVisitor {
            type Value = LabelCounts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of label to {Passed, Failed} counts")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, PassFail)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen: HashSet<String> = HashSet::with_capacity(entries.capacity());
                while let Some((label, counts)) = access.next_entry::<String, PassFail>()? {
                    if !seen.insert(label.clone()) {
                        return Err(de::Error::custom(format!("duplicate label `{}`", label)));
                    }
                    entries.push((label, counts));
                }
                Ok(LabelCounts(entries))
            }
        }

        deserializer.deserialize_map(LabelCountsVisitor)
    }
}

/// One versioned test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildRecord {
    pub version: BuildId,
    pub abs_passed: u64,
    pub abs_failed: u64,
    /// Percentage of passed tests (0-100); derived from counts when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_passed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_failed: Option<f64>,
    #[serde(default)]
    pub by_platform: LabelCounts,
    #[serde(default)]
    pub by_priority: LabelCounts,
    #[serde(default)]
    pub by_category: LabelCounts,
    /// When the build ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl BuildRecord {
    /// Create a record from absolute counts, deriving the percentages
    pub fn new(version: impl Into<BuildId>, passed: u64, failed: u64) -> Self {
        let total = passed + failed;
        Self {
            version: version.into(),
            abs_passed: passed,
            abs_failed: failed,
            rel_passed: Some(percent(passed, total)),
            rel_failed: Some(percent(failed, total)),
            by_platform: LabelCounts::new(),
            by_priority: LabelCounts::new(),
            by_category: LabelCounts::new(),
            date: None,
        }
    }

    /// Attach a breakdown mapping for one dimension
    pub fn with_breakdown(mut self, dimension: Dimension, counts: LabelCounts) -> Self {
        match dimension {
            Dimension::Platform => self.by_platform = counts,
            Dimension::Priority => self.by_priority = counts,
            Dimension::Category => self.by_category = counts,
        }
        self
    }

    pub fn total(&self) -> u64 {
        self.abs_passed + self.abs_failed
    }

    pub fn relative_passed(&self) -> f64 {
        self.rel_passed
            .unwrap_or_else(|| percent(self.abs_passed, self.total()))
    }

    pub fn relative_failed(&self) -> f64 {
        self.rel_failed
            .unwrap_or_else(|| percent(self.abs_failed, self.total()))
    }

    pub fn breakdown(&self, dimension: Dimension) -> &LabelCounts {
        match dimension {
            Dimension::Platform => &self.by_platform,
            Dimension::Priority => &self.by_priority,
            Dimension::Category => &self.by_category,
        }
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// A `[build, value]` point of a time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint(pub BuildId, pub f64);

impl SeriesPoint {
    pub fn build(&self) -> &BuildId {
        &self.0
    }

    pub fn value(&self) -> f64 {
        self.1
    }
}

/// A named, chronologically ordered sequence of points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub key: String,
    pub values: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: Vec::new(),
        }
    }

    /// Find the point for a build by identifier
    pub fn find(&self, build: &BuildId) -> Option<&SeriesPoint> {
        self.values.iter().find(|p| p.build() == build)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A Passed/Failed pair of series (index 0 is Passed, index 1 is Failed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimeSeries>", into = "Vec<TimeSeries>")]
pub struct SeriesSet {
    passed: TimeSeries,
    failed: TimeSeries,
}

impl SeriesSet {
    pub const PASSED: usize = 0;
    pub const FAILED: usize = 1;

    pub fn new(passed: TimeSeries, failed: TimeSeries) -> Self {
        Self { passed, failed }
    }

    pub fn passed(&self) -> &TimeSeries {
        &self.passed
    }

    pub fn failed(&self) -> &TimeSeries {
        &self.failed
    }

    pub fn series(&self, index: usize) -> Option<&TimeSeries> {
        match index {
            Self::PASSED => Some(&self.passed),
            Self::FAILED => Some(&self.failed),
            _ => None,
        }
    }

    /// The other series of the pair
    pub fn sibling(&self, index: usize) -> Option<&TimeSeries> {
        match index {
            Self::PASSED => Some(&self.failed),
            Self::FAILED => Some(&self.passed),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeries> {
        [&self.passed, &self.failed].into_iter()
    }

    /// Most recent build of the set, taken from the Passed series
    pub fn latest_build(&self) -> Option<&BuildId> {
        self.passed.values.last().map(SeriesPoint::build)
    }

    pub fn is_empty(&self) -> bool {
        self.passed.is_empty() && self.failed.is_empty()
    }
}

impl TryFrom<Vec<TimeSeries>> for SeriesSet {
    type Error = String;

    fn try_from(series: Vec<TimeSeries>) -> std::result::Result<Self, Self::Error> {
        let count = series.len();
        let mut iter = series.into_iter();
        match (iter.next(), iter.next(), iter.next()) {
            (Some(passed), Some(failed), None) => Ok(Self { passed, failed }),
            _ => Err(format!("expected exactly 2 series, found {}", count)),
        }
    }
}

impl From<SeriesSet> for Vec<TimeSeries> {
    fn from(set: SeriesSet) -> Self {
        vec![set.passed, set.failed]
    }
}

/// Timeline payload as delivered by a data source
#[derive(Debug, Clone, PartialEq)]
pub enum TimelinePayload {
    /// Combined mode: one record per build, breakdowns embedded
    Records(Vec<BuildRecord>),
    /// Legacy mode: pre-split relative and absolute series
    Split {
        relative: SeriesSet,
        absolute: SeriesSet,
    },
}

/// Load build records from a JSON file
pub fn load_records_from_file(path: &Path) -> Result<Vec<BuildRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_records(&content)
        .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e)))
}

/// Parse build records from a JSON string
pub fn parse_records(content: &str) -> Result<Vec<BuildRecord>> {
    let records: Vec<BuildRecord> = serde_json::from_str(content)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_build_id_from_number_and_string() {
        let ids: Vec<BuildId> = serde_json::from_str(r#"[1200, "2.5.0-1201"]"#).unwrap();
        assert_eq!(ids, vec![BuildId::from(1200u64), BuildId::from("2.5.0-1201")]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), r#""1200""#);
    }

    #[test]
    fn test_label_counts_preserve_document_order() {
        let counts: LabelCounts = serde_json::from_str(
            r#"{"Windows": {"Passed": 1, "Failed": 0},
                "Centos": {"Passed": 5, "Failed": 2},
                "Arm": {"Passed": 0, "Failed": 0}}"#,
        )
        .unwrap();

        let labels: Vec<&str> = counts.labels().collect();
        assert_eq!(labels, vec!["Windows", "Centos", "Arm"]);
        assert_eq!(counts.get("Centos"), Some(&PassFail::new(5, 2)));

        let json = serde_json::to_string(&counts).unwrap();
        assert!(json.find("Windows").unwrap() < json.find("Arm").unwrap());
    }

    #[test]
    fn test_label_counts_reject_duplicates() {
        let result: std::result::Result<LabelCounts, _> = serde_json::from_str(
            r#"{"P0": {"Passed": 1, "Failed": 0}, "P0": {"Passed": 2, "Failed": 0}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_label_counts_many_labels() {
        let body = (0..5000)
            .map(|i| format!(r#""label-{}": {{"Passed": {}, "Failed": 1}}"#, i, i))
            .collect::<Vec<_>>()
            .join(",");
        let counts: LabelCounts = serde_json::from_str(&format!("{{{}}}", body)).unwrap();
        assert_eq!(counts.len(), 5000);
        assert_eq!(counts.labels().next(), Some("label-0"));
        assert_eq!(counts.get("label-4999"), Some(&PassFail::new(4999, 1)));

        let late_duplicate = format!(r#"{{{}, "label-0": {{"Passed": 0, "Failed": 0}}}}"#, body);
        assert!(serde_json::from_str::<LabelCounts>(&late_duplicate).is_err());
    }

    #[test]
    fn test_label_counts_collect_keeps_first_position() {
        let counts: LabelCounts = vec![
            ("Linux", PassFail::new(1, 0)),
            ("Mac", PassFail::new(2, 0)),
            ("Linux", PassFail::new(3, 1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(counts.labels().collect::<Vec<_>>(), vec!["Linux", "Mac"]);
        assert_eq!(counts.get("Linux"), Some(&PassFail::new(3, 1)));
    }

    #[test]
    fn test_build_record_wire_format() {
        let record: BuildRecord = serde_json::from_str(
            r#"{"Version": 7, "AbsPassed": 8, "AbsFailed": 2,
                "ByPlatform": {"Linux": {"Passed": 8, "Failed": 2}}}"#,
        )
        .unwrap();

        assert_eq!(record.version.as_str(), "7");
        assert_eq!(record.total(), 10);
        assert_eq!(record.relative_passed(), 80.0);
        assert_eq!(record.relative_failed(), 20.0);
        assert!(record.by_priority.is_empty());
        assert_eq!(record.breakdown(Dimension::Platform).len(), 1);
    }

    #[test]
    fn test_explicit_percentages_win() {
        let record: BuildRecord = serde_json::from_str(
            r#"{"Version": "b1", "AbsPassed": 2, "AbsFailed": 1, "RelPassed": 66.7, "RelFailed": 33.3}"#,
        )
        .unwrap();
        assert_eq!(record.relative_passed(), 66.7);
        assert_eq!(record.relative_failed(), 33.3);
    }

    #[test]
    fn test_zero_total_percentages() {
        let record = BuildRecord::new("empty", 0, 0);
        assert_eq!(record.relative_passed(), 0.0);
        assert_eq!(record.relative_failed(), 0.0);
    }

    #[test]
    fn test_series_set_requires_two_series() {
        let ok: SeriesSet = serde_json::from_str(
            r#"[{"key": "Passed", "values": [["1", 8]]}, {"key": "Failed", "values": [["1", -2]]}]"#,
        )
        .unwrap();
        assert_eq!(ok.passed().values[0], SeriesPoint(BuildId::from("1"), 8.0));
        assert_eq!(ok.latest_build(), Some(&BuildId::from("1")));

        let bad: std::result::Result<SeriesSet, _> =
            serde_json::from_str(r#"[{"key": "Passed", "values": []}]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_series_find_by_identifier() {
        let mut series = TimeSeries::new("Failed");
        series.values.push(SeriesPoint(BuildId::from("b2"), -3.0));
        series.values.push(SeriesPoint(BuildId::from("b1"), -1.0));

        assert_eq!(series.find(&BuildId::from("b1")).map(SeriesPoint::value), Some(-1.0));
        assert!(series.find(&BuildId::from("b3")).is_none());
    }

    #[test]
    fn test_dimension_from_str() {
        assert_eq!("Platform".parse::<Dimension>().unwrap(), Dimension::Platform);
        assert_eq!(" category ".parse::<Dimension>().unwrap(), Dimension::Category);
        assert!(matches!(
            "os".parse::<Dimension>(),
            Err(Error::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"Version": 1, "AbsPassed": 8, "AbsFailed": 2}}, {{"Version": 2, "AbsPassed": 9, "AbsFailed": 1}}]"#
        )
        .unwrap();

        let records = load_records_from_file(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].version, BuildId::from(2u64));
    }

    #[test]
    fn test_load_records_missing_or_malformed() {
        let missing = load_records_from_file(Path::new("/nonexistent/records.json"));
        assert!(matches!(missing, Err(Error::FileReadError { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let malformed = load_records_from_file(file.path()).unwrap_err();
        assert!(malformed.is_fatal());
    }
}
