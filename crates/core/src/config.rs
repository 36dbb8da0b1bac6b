//! Dashboard configuration

use crate::accessor::TickFormat;
use crate::error::{Error, Result};
use crate::layout::LayoutConfig;
use crate::selection::FetchMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a dashboard instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub layout: LayoutConfig,
    /// Formatting of numeric axis ticks
    pub tick_format: TickFormat,
    /// How the three breakdowns of a selection are fetched
    pub fetch_mode: FetchMode,
}

impl DashboardConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.layout.validate()
    }
}
