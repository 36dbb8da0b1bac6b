//! Dashboard initialization: load the timeline once, then drive selections

use crate::accessor::{TickFormat, Tooltips};
use crate::config::DashboardConfig;
use crate::data::{BuildId, TimelinePayload};
use crate::error::{Error, Result};
use crate::selection::{SelectOutcome, SelectionController, SelectionState};
use crate::series::{normalize, ChartSeries};
use crate::source::DataSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A loaded dashboard: immutable chart series plus the selection controller
pub struct Dashboard<S> {
    series: ChartSeries,
    controller: Arc<SelectionController<S>>,
    tooltips: Arc<Tooltips>,
    tick_format: TickFormat,
}

impl<S: DataSource> Dashboard<S> {
    /// Fetch and normalize the timeline, then auto-select the latest build.
    ///
    /// Timeline failures are fatal. A failing initial selection is logged
    /// and leaves the controller idle.
    pub async fn load(source: S, config: DashboardConfig) -> Result<Self> {
        config.validate()?;

        let payload = source.timeline().await.map_err(into_load_error)?;
        let latest = match &payload {
            TimelinePayload::Records(records) => records.last().map(|r| r.version.clone()),
            TimelinePayload::Split { relative, .. } => {
                let fetched = source.latest().await.unwrap_or_else(|e| {
                    warn!("Failed to fetch latest build: {}", e);
                    None
                });
                fetched.or_else(|| {
                    let fallback = relative.latest_build().cloned();
                    if let Some(build) = &fallback {
                        debug!("Falling back to last plotted build {}", build);
                    }
                    fallback
                })
            }
        };

        let series = normalize(payload);
        info!("Loaded timeline with {} builds", series.relative.passed().len());

        let dashboard = Self {
            series,
            controller: Arc::new(SelectionController::new(
                source,
                config.layout,
                config.fetch_mode,
            )),
            tooltips: Arc::new(Tooltips::new()?),
            tick_format: config.tick_format,
        };

        match latest {
            Some(build) => {
                if let Err(e) = dashboard.controller.select_build(build).await {
                    warn!("Initial selection failed: {}", e);
                }
            }
            None => info!("Timeline is empty, nothing to select"),
        }

        Ok(dashboard)
    }

    pub fn series(&self) -> &ChartSeries {
        &self.series
    }

    pub fn controller(&self) -> &Arc<SelectionController<S>> {
        &self.controller
    }

    pub fn tooltips(&self) -> &Arc<Tooltips> {
        &self.tooltips
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn selection(&self) -> Option<Arc<SelectionState>> {
        self.controller.current()
    }

    pub async fn select(&self, build: BuildId) -> Result<SelectOutcome> {
        self.controller.select_build(build).await
    }

    pub fn tick_format(&self) -> TickFormat {
        self.tick_format
    }

    /// Axis tick label with the configured format
    pub fn tick(&self, value: f64) -> String {
        self.tick_format.format(value)
    }

    pub fn relative_tooltip(&self, series_key: &str, build: &BuildId, percent: f64) -> Result<String> {
        self.tooltips.relative(series_key, build, percent)
    }

    pub fn absolute_tooltip(
        &self,
        series_key: &str,
        build: &BuildId,
        count: f64,
        series_index: usize,
    ) -> Result<Option<String>> {
        self.tooltips
            .absolute(series_key, build, count, series_index, &self.series.absolute)
    }

    pub fn breakdown_tooltip(&self, status: &str, count: f64) -> Result<Option<String>> {
        self.controller.breakdown_tooltip(&self.tooltips, status, count)
    }
}

fn into_load_error(e: Error) -> Error {
    if e.is_fatal() {
        e
    } else {
        Error::LoadError(e.to_string())
    }
}
