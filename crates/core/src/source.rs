//! Data-source abstraction and in-memory implementations

use crate::data::{
    load_records_from_file, BuildId, BuildRecord, Dimension, LabelCounts, SeriesSet,
    TimelinePayload,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Asynchronous provider of timeline and breakdown payloads
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the build timeline
    async fn timeline(&self) -> Result<TimelinePayload>;

    /// Fetch the label counts of one build along one dimension
    async fn breakdown(&self, dimension: Dimension, build: &BuildId) -> Result<LabelCounts>;

    /// Most recent build, `None` for an empty timeline
    async fn latest(&self) -> Result<Option<BuildId>> {
        Ok(match self.timeline().await? {
            TimelinePayload::Records(records) => records.last().map(|r| r.version.clone()),
            TimelinePayload::Split { relative, .. } => relative.latest_build().cloned(),
        })
    }
}

#[async_trait]
impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    async fn timeline(&self) -> Result<TimelinePayload> {
        (**self).timeline().await
    }

    async fn breakdown(&self, dimension: Dimension, build: &BuildId) -> Result<LabelCounts> {
        (**self).breakdown(dimension, build).await
    }

    async fn latest(&self) -> Result<Option<BuildId>> {
        (**self).latest().await
    }
}

fn missing(dimension: Dimension, build: &BuildId) -> Error {
    Error::ProjectionError {
        build: build.to_string(),
        dimension: dimension.to_string(),
    }
}

/// Immutable record cache serving the combined timeline with embedded breakdowns
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    records: Arc<Vec<BuildRecord>>,
}

impl RecordSource {
    pub fn new(records: Vec<BuildRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_records_from_file(path)?))
    }

    pub fn records(&self) -> &[BuildRecord] {
        &self.records
    }
}

#[async_trait]
impl DataSource for RecordSource {
    async fn timeline(&self) -> Result<TimelinePayload> {
        Ok(TimelinePayload::Records(self.records.as_ref().clone()))
    }

    async fn breakdown(&self, dimension: Dimension, build: &BuildId) -> Result<LabelCounts> {
        self.records
            .iter()
            .rev()
            .find(|r| &r.version == build)
            .map(|r| r.breakdown(dimension).clone())
            .ok_or_else(|| missing(dimension, build))
    }

    async fn latest(&self) -> Result<Option<BuildId>> {
        Ok(self.records.last().map(|r| r.version.clone()))
    }
}

/// Pre-split series with breakdowns served per dimension and build
#[derive(Debug, Clone)]
pub struct SplitSource {
    relative: SeriesSet,
    absolute: SeriesSet,
    breakdowns: HashMap<(Dimension, BuildId), LabelCounts>,
}

impl SplitSource {
    pub fn new(relative: SeriesSet, absolute: SeriesSet) -> Self {
        Self {
            relative,
            absolute,
            breakdowns: HashMap::new(),
        }
    }

    pub fn with_breakdown(
        mut self,
        dimension: Dimension,
        build: impl Into<BuildId>,
        counts: LabelCounts,
    ) -> Self {
        self.breakdowns.insert((dimension, build.into()), counts);
        self
    }
}

#[async_trait]
impl DataSource for SplitSource {
    async fn timeline(&self) -> Result<TimelinePayload> {
        Ok(TimelinePayload::Split {
            relative: self.relative.clone(),
            absolute: self.absolute.clone(),
        })
    }

    async fn breakdown(&self, dimension: Dimension, build: &BuildId) -> Result<LabelCounts> {
        self.breakdowns
            .get(&(dimension, build.clone()))
            .cloned()
            .ok_or_else(|| missing(dimension, build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PassFail;
    use crate::series::{absolute_series, relative_series};

    fn records() -> Vec<BuildRecord> {
        vec![
            BuildRecord::new("1", 8, 2).with_breakdown(
                Dimension::Platform,
                [("Linux", PassFail::new(8, 2))].into_iter().collect(),
            ),
            BuildRecord::new("2", 9, 1),
        ]
    }

    #[tokio::test]
    async fn test_record_source() {
        let source = RecordSource::new(records());

        assert_eq!(source.latest().await.unwrap(), Some(BuildId::from("2")));
        let counts = source
            .breakdown(Dimension::Platform, &BuildId::from("1"))
            .await
            .unwrap();
        assert_eq!(counts.get("Linux"), Some(&PassFail::new(8, 2)));

        let err = source
            .breakdown(Dimension::Platform, &BuildId::from("3"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProjectionError { .. }));
    }

    #[tokio::test]
    async fn test_empty_record_source() {
        let source = RecordSource::default();
        assert_eq!(source.latest().await.unwrap(), None);
        assert_eq!(
            source.timeline().await.unwrap(),
            TimelinePayload::Records(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_split_source_default_latest() {
        let recs = records();
        let source = SplitSource::new(relative_series(&recs), absolute_series(&recs))
            .with_breakdown(Dimension::Priority, "2", LabelCounts::new());

        assert_eq!(source.latest().await.unwrap(), Some(BuildId::from("2")));
        assert!(source
            .breakdown(Dimension::Priority, &BuildId::from("2"))
            .await
            .unwrap()
            .is_empty());
        assert!(source
            .breakdown(Dimension::Platform, &BuildId::from("2"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_shared_source() {
        let source: Arc<dyn DataSource> = Arc::new(RecordSource::new(records()));
        assert_eq!(source.latest().await.unwrap(), Some(BuildId::from("2")));
    }
}
