//! Error types for buildboard-core

use thiserror::Error;

/// Result type alias for buildboard-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the engine and its front ends
#[derive(Error, Debug)]
pub enum Error {
    /// Initial data could not be fetched or is malformed. Fatal to dashboard initialization.
    #[error("Failed to load dashboard data: {0}")]
    LoadError(String),

    /// The requested build is unknown to the data source.
    #[error("No {dimension} breakdown for build {build}")]
    ProjectionError { build: String, dimension: String },

    #[error("Unknown breakdown dimension: {0}")]
    UnknownDimension(String),

    /// Transport failure while fetching on-demand data.
    #[error("Data source error: {0}")]
    SourceError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error stops dashboard initialization
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::LoadError(_) | Error::FileReadError { .. })
    }
}
