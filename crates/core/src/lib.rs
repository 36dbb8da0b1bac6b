//! buildboard-core - Build-result aggregation and drill-down state engine
//!
//! This crate turns a time-ordered series of build/test-run records into
//! chart-ready projections and keeps the per-build breakdown panels
//! consistent while the user selects builds on the timeline.
//!
//! # Features
//!
//! - Relative (percentage) and absolute (count) time series per build
//! - Per-build breakdowns by platform, priority and category
//! - Selection controller with last-selection-wins and atomic publishing
//! - Axis, tooltip and layout helpers for the rendering layer
//!
//! # Example
//!
//! ```no_run
//! use buildboard_core::{BuildId, Dashboard, DashboardConfig, RecordSource};
//!
//! # async fn run() -> buildboard_core::Result<()> {
//! let source = RecordSource::from_file("builds.json".as_ref())?;
//! let dashboard = Dashboard::load(source, DashboardConfig::default()).await?;
//!
//! dashboard.select(BuildId::from("2.5.0-1200")).await?;
//! if let Some(state) = dashboard.selection() {
//!     println!("{} platforms", state.platform.cardinality);
//! }
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod breakdown;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod layout;
pub mod selection;
pub mod series;
pub mod source;

pub use accessor::{x_accessor, y_accessor, ChartPoint, TickFormat, Tooltips};
pub use breakdown::{project_counts, project_from, project_record, BreakdownEntry, BreakdownView, Status};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use data::{
    load_records_from_file, BuildId, BuildRecord, Dimension, LabelCounts, PassFail, SeriesPoint,
    SeriesSet, TimeSeries, TimelinePayload,
};
pub use error::{Error, Result};
pub use layout::{item_width, LayoutConfig};
pub use selection::{
    BreakdownPanel, FetchMode, Phase, SelectOutcome, SelectionController, SelectionState,
};
pub use series::{absolute_series, normalize, relative_series, ChartSeries};
pub use source::{DataSource, RecordSource, SplitSource};
