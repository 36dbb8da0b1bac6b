//! HTTP data source for a dashboard backend

use crate::error::Result;
use async_trait::async_trait;
use buildboard_core::{
    BuildId, BuildRecord, DataSource, Dimension, Error as CoreError, LabelCounts, RecordSource,
    SeriesSet, TimelinePayload,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Shape of the timeline endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TimelineMode {
    /// `GET timeline` returns build records with embedded breakdowns
    Combined,
    /// `GET rel_timeline` and `GET abs_timeline` return pre-split series
    Split,
}

/// Dashboard backend reached over HTTP
///
/// In combined mode the timeline is fetched once and kept; breakdowns and
/// the latest build are then answered from those records. Only split mode
/// talks to the `by_*` and `latest` endpoints.
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
    mode: TimelineMode,
    records: OnceCell<RecordSource>,
}

impl HttpSource {
    pub fn new(base_url: &str, mode: TimelineMode) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        let client = reqwest::Client::builder()
            .user_agent("buildboard")
            .build()?;

        Ok(Self {
            client,
            base,
            mode,
            records: OnceCell::new(),
        })
    }

    fn endpoint(&self, path: &str) -> buildboard_core::Result<Url> {
        self.base
            .join(path)
            .map_err(|e| CoreError::ConfigError(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// URL of the breakdown endpoint for one dimension and build
    pub fn breakdown_url(&self, dimension: Dimension, build: &BuildId) -> buildboard_core::Result<Url> {
        let mut url = self.endpoint(dimension.endpoint())?;
        url.query_pairs_mut().append_pair("build", build.as_str());
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, reqwest::Error> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn cached_records(&self) -> buildboard_core::Result<&RecordSource> {
        self.records
            .get_or_try_init(|| async {
                let records: Vec<BuildRecord> = self
                    .get_json(self.endpoint("timeline")?)
                    .await
                    .map_err(load_error)?;
                debug!("Cached {} build records", records.len());
                Ok::<_, CoreError>(RecordSource::new(records))
            })
            .await
    }
}

fn load_error(e: reqwest::Error) -> CoreError {
    CoreError::LoadError(e.to_string())
}

fn source_error(e: reqwest::Error) -> CoreError {
    CoreError::SourceError(e.to_string())
}

#[async_trait]
impl DataSource for HttpSource {
    async fn timeline(&self) -> buildboard_core::Result<TimelinePayload> {
        match self.mode {
            TimelineMode::Combined => self.cached_records().await?.timeline().await,
            TimelineMode::Split => {
                let (relative, absolute) = tokio::try_join!(
                    self.get_json::<SeriesSet>(self.endpoint("rel_timeline")?),
                    self.get_json::<SeriesSet>(self.endpoint("abs_timeline")?),
                )
                .map_err(load_error)?;
                Ok(TimelinePayload::Split { relative, absolute })
            }
        }
    }

    async fn breakdown(&self, dimension: Dimension, build: &BuildId) -> buildboard_core::Result<LabelCounts> {
        if self.mode == TimelineMode::Combined {
            return self.cached_records().await?.breakdown(dimension, build).await;
        }

        let url = self.breakdown_url(dimension, build)?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(source_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CoreError::ProjectionError {
                build: build.to_string(),
                dimension: dimension.to_string(),
            });
        }

        response
            .error_for_status()
            .map_err(source_error)?
            .json()
            .await
            .map_err(source_error)
    }

    async fn latest(&self) -> buildboard_core::Result<Option<BuildId>> {
        if self.mode == TimelineMode::Combined {
            return self.cached_records().await?.latest().await;
        }

        self.get_json(self.endpoint("latest")?)
            .await
            .map_err(source_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildboard_core::{Dashboard, DashboardConfig, Phase};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn counts(label: &str, passed: u64, failed: u64) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(label.to_string(), json!({ "Passed": passed, "Failed": failed }));
        serde_json::Value::Object(map)
    }

    fn series(passed: f64, failed: f64) -> serde_json::Value {
        json!([
            { "key": "Passed", "values": [["41", passed - 1.0], ["42", passed]] },
            { "key": "Failed", "values": [["41", failed], ["42", failed]] }
        ])
    }

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_combined_mode_serves_breakdowns_from_timeline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeline"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "Version": 41, "AbsPassed": 9, "AbsFailed": 1 },
                {
                    "Version": 42, "AbsPassed": 8, "AbsFailed": 2,
                    "ByPlatform": counts("Linux", 8, 2),
                    "ByPriority": counts("P0", 8, 2),
                    "ByCategory": counts("Query", 8, 2)
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        // no by_* or latest routes are mounted; hitting them would 404
        let source = HttpSource::new(&server.uri(), TimelineMode::Combined).unwrap();

        let dashboard = Dashboard::load(source, DashboardConfig::default()).await.unwrap();
        assert_eq!(
            dashboard.controller().phase(),
            Phase::Ready { build: BuildId::from(42u64) }
        );
        let selection = dashboard.selection().unwrap();
        assert_eq!(selection.platform.view.labels().collect::<Vec<_>>(), vec!["Linux"]);

        // build 41 has no embedded breakdowns, so every dimension is empty
        let outcome = dashboard.select(BuildId::from(41u64)).await.unwrap();
        assert_eq!(outcome.state().unwrap().platform.cardinality, 0);
        assert_eq!(dashboard.selection().unwrap().build, BuildId::from(41u64));

        assert!(matches!(
            dashboard.select(BuildId::from(7u64)).await,
            Err(CoreError::ProjectionError { .. })
        ));
    }

    #[tokio::test]
    async fn test_split_mode_fetches_breakdowns_lazily() {
        let server = MockServer::start().await;
        mount_json(&server, "/rel_timeline", series(90.0, 10.0)).await;
        mount_json(&server, "/abs_timeline", series(9.0, -1.0)).await;
        mount_json(&server, "/latest", json!("42")).await;
        for (route, label) in [("/by_platform", "Linux"), ("/by_priority", "P1"), ("/by_category", "Query")] {
            Mock::given(method("GET"))
                .and(path(route))
                .and(query_param("build", "42"))
                .respond_with(ResponseTemplate::new(200).set_body_json(counts(label, 9, 1)))
                .expect(1)
                .mount(&server)
                .await;
        }
        let source = HttpSource::new(&server.uri(), TimelineMode::Split).unwrap();

        let dashboard = Dashboard::load(source, DashboardConfig::default()).await.unwrap();
        assert_eq!(dashboard.series().relative.passed().len(), 2);

        let selection = dashboard.selection().unwrap();
        assert_eq!(selection.build, BuildId::from("42"));
        assert_eq!(selection.priority.view.labels().collect::<Vec<_>>(), vec!["P1"]);
    }

    #[tokio::test]
    async fn test_split_breakdown_not_found_is_projection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by_platform"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let source = HttpSource::new(&server.uri(), TimelineMode::Split).unwrap();

        let err = source
            .breakdown(Dimension::Platform, &BuildId::from("42"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProjectionError { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_split_breakdown_server_error_is_source_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by_category"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let source = HttpSource::new(&server.uri(), TimelineMode::Split).unwrap();

        let err = source
            .breakdown(Dimension::Category, &BuildId::from("42"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SourceError(_)));
    }

    #[tokio::test]
    async fn test_split_timeline_undecodable_is_load_error() {
        let server = MockServer::start().await;
        mount_json(&server, "/rel_timeline", json!([{ "key": "Passed", "values": [] }])).await;
        mount_json(&server, "/abs_timeline", series(9.0, -1.0)).await;
        let source = HttpSource::new(&server.uri(), TimelineMode::Split).unwrap();

        let err = Dashboard::load(source, DashboardConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::LoadError(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let source = HttpSource::new("http://localhost:8000/dashboard", TimelineMode::Combined).unwrap();

        assert_eq!(
            source.endpoint("timeline").unwrap().as_str(),
            "http://localhost:8000/dashboard/timeline"
        );
        assert_eq!(
            source.endpoint("rel_timeline").unwrap().as_str(),
            "http://localhost:8000/dashboard/rel_timeline"
        );
    }

    #[test]
    fn test_breakdown_url_encodes_build() {
        let source = HttpSource::new("http://localhost:8000/", TimelineMode::Split).unwrap();
        let url = source
            .breakdown_url(Dimension::Priority, &BuildId::from("2.5.0 #1200"))
            .unwrap();

        assert_eq!(url.path(), "/by_priority");
        assert_eq!(url.query(), Some("build=2.5.0+%231200"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpSource::new("not a url", TimelineMode::Combined).is_err());
    }
}
