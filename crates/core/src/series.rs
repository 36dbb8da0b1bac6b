//! Series normalization: build records to chart-ready time series

use crate::data::{BuildRecord, SeriesPoint, SeriesSet, TimeSeries, TimelinePayload};
use serde::{Deserialize, Serialize};

pub const RELATIVE_PASSED_KEY: &str = "Passed, %";
pub const RELATIVE_FAILED_KEY: &str = "Failed, %";
pub const ABSOLUTE_PASSED_KEY: &str = "Passed";
pub const ABSOLUTE_FAILED_KEY: &str = "Failed";

/// Both chart projections of a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Pass/fail percentages per build
    pub relative: SeriesSet,
    /// Pass/fail counts per build, failures negated
    pub absolute: SeriesSet,
}

impl ChartSeries {
    pub fn empty() -> Self {
        Self {
            relative: relative_series(&[]),
            absolute: absolute_series(&[]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relative.is_empty() && self.absolute.is_empty()
    }
}

/// Normalize a timeline payload into chart series.
///
/// Records are projected in their source order. Pre-split payloads are
/// passed through untouched.
pub fn normalize(payload: TimelinePayload) -> ChartSeries {
    match payload {
        TimelinePayload::Records(records) => ChartSeries {
            relative: relative_series(&records),
            absolute: absolute_series(&records),
        },
        TimelinePayload::Split { relative, absolute } => ChartSeries { relative, absolute },
    }
}

/// Percentage series: `Passed, %` and `Failed, %`
pub fn relative_series(records: &[BuildRecord]) -> SeriesSet {
    build_set(
        records,
        (RELATIVE_PASSED_KEY, BuildRecord::relative_passed),
        (RELATIVE_FAILED_KEY, BuildRecord::relative_failed),
    )
}

/// Count series: `Passed` and `Failed`.
///
/// Failed counts are negative so the chart mirrors them below the axis.
pub fn absolute_series(records: &[BuildRecord]) -> SeriesSet {
    build_set(
        records,
        (ABSOLUTE_PASSED_KEY, |r: &BuildRecord| r.abs_passed as f64),
        (ABSOLUTE_FAILED_KEY, |r: &BuildRecord| 0.0 - r.abs_failed as f64),
    )
}

fn build_set<P, F>(records: &[BuildRecord], passed: (&str, P), failed: (&str, F)) -> SeriesSet
where
    P: Fn(&BuildRecord) -> f64,
    F: Fn(&BuildRecord) -> f64,
{
    SeriesSet::new(
        project(records, passed.0, passed.1),
        project(records, failed.0, failed.1),
    )
}

fn project(records: &[BuildRecord], key: &str, value: impl Fn(&BuildRecord) -> f64) -> TimeSeries {
    TimeSeries {
        key: key.to_string(),
        values: records
            .iter()
            .map(|r| SeriesPoint(r.version.clone(), value(r)))
            .collect(),
    }
}
