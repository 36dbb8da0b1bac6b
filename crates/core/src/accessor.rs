//! Accessors and formatters handed to the rendering layer

use crate::breakdown::BreakdownEntry;
use crate::data::{BuildId, SeriesPoint, SeriesSet};
use crate::error::Result;
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A point a chart can plot
pub trait ChartPoint {
    fn key(&self) -> &str;
    fn value(&self) -> f64;
}

impl ChartPoint for SeriesPoint {
    fn key(&self) -> &str {
        self.build().as_str()
    }

    fn value(&self) -> f64 {
        SeriesPoint::value(self)
    }
}

impl ChartPoint for BreakdownEntry {
    fn key(&self) -> &str {
        self.key.as_str()
    }

    fn value(&self) -> f64 {
        self.value as f64
    }
}

pub fn x_accessor<P: ChartPoint>(point: &P) -> &str {
    point.key()
}

pub fn y_accessor<P: ChartPoint>(point: &P) -> f64 {
    point.value()
}

/// Numeric axis tick formatting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickFormat {
    /// Whole numbers, rounded half away from zero
    #[default]
    Integer,
    /// Shortest decimal representation
    General,
}

impl TickFormat {
    /// Format the magnitude of a tick value; the sign is dropped
    pub fn format(&self, value: f64) -> String {
        let magnitude = value.abs();
        match self {
            TickFormat::Integer => format!("{:.0}", magnitude.round()),
            TickFormat::General => format!("{}", magnitude),
        }
    }
}

const RELATIVE_SUFFIX: &str = ", %";

const RELATIVE_TOOLTIP: &str =
    "<h3>{{ status }}</h3><p>{{ percent }}% of tests in build {{ build }}</p>";
const ABSOLUTE_TOOLTIP: &str =
    "<h3>{{ status }}</h3><p>{{ count }} of {{ total }} tests in build {{ build }}</p>";
const BREAKDOWN_TOOLTIP: &str = "<h3>{{ status }}</h3><p>{{ count }} tests in build {{ build }}</p>";

/// Tooltip renderer with HTML-escaped fixed templates
pub struct Tooltips {
    env: Environment<'static>,
}

impl Tooltips {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("relative.html", RELATIVE_TOOLTIP)?;
        env.add_template("absolute.html", ABSOLUTE_TOOLTIP)?;
        env.add_template("breakdown.html", BREAKDOWN_TOOLTIP)?;
        Ok(Self { env })
    }

    /// Tooltip for a point of the percentage chart
    pub fn relative(&self, series_key: &str, build: &BuildId, percent: f64) -> Result<String> {
        let status = series_key.strip_suffix(RELATIVE_SUFFIX).unwrap_or(series_key);
        let html = self.env.get_template("relative.html")?.render(context! {
            status => status,
            percent => format!("{:.1}", percent),
            build => build.as_str(),
        })?;
        Ok(html)
    }

    /// Tooltip for a point of the count chart.
    ///
    /// The series hold per-status counts only, so the total is recovered
    /// from the sibling series' point for the same build. Returns `None`
    /// when the sibling has no point for `build`.
    pub fn absolute(
        &self,
        series_key: &str,
        build: &BuildId,
        count: f64,
        series_index: usize,
        absolute: &SeriesSet,
    ) -> Result<Option<String>> {
        let Some(sibling) = absolute.sibling(series_index) else {
            debug!("No sibling for series index {}", series_index);
            return Ok(None);
        };
        let Some(point) = sibling.find(build) else {
            debug!("Build {} missing from series {:?}", build, sibling.key);
            return Ok(None);
        };

        let count = count.abs();
        let total = count + point.value().abs();
        let html = self.env.get_template("absolute.html")?.render(context! {
            status => series_key,
            count => TickFormat::General.format(count),
            total => TickFormat::General.format(total),
            build => build.as_str(),
        })?;
        Ok(Some(html))
    }

    /// Tooltip for a breakdown slice of the given build
    pub fn breakdown(&self, status: &str, count: f64, build: &BuildId) -> Result<String> {
        let html = self.env.get_template("breakdown.html")?.render(context! {
            status => status,
            count => TickFormat::General.format(count),
            build => build.as_str(),
        })?;
        Ok(html)
    }
}
