//! Error types for building, loading and querying a model.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or saving a model.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No rows were supplied.
    #[error("training dataset is empty")]
    EmptyDataset,

    /// A row carried a NaN or infinite feature value.
    #[error("row {row}: feature {feature} must be finite, got {value}")]
    InvalidFeature {
        row: usize,
        feature: &'static str,
        value: f64,
    },

    /// More rows than the `u32` id space can address.
    #[error("dataset has {rows} rows, more than the index can address")]
    TooManyRows { rows: usize },

    /// The forest needs at least one tree.
    #[error("tree count must be at least 1")]
    NoTrees,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode artifact: {0}")]
    Encode(#[from] bincode::Error),

    #[error("failed to encode artifact: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading a persisted model.
///
/// Any of these aborts startup; there is no partial load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing model artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("corrupt {artifact}: {message}")]
    Corrupt {
        artifact: &'static str,
        message: String,
    },

    #[error("{artifact} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        artifact: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{artifact} uses unsupported format version {version}")]
    UnsupportedVersion { artifact: &'static str, version: u32 },

    /// The artifacts decode individually but do not belong together.
    #[error("inconsistent model: {0}")]
    Inconsistent(String),

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn corrupt(artifact: &'static str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            artifact,
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the search API.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Load(#[from] LoadError),

    /// A query arrived before any model was published.
    #[error("no model is loaded")]
    NotReady,

    #[error("missing required feature: {feature}")]
    MissingFeature { feature: &'static str },

    #[error("feature {feature} must be a finite number, got {value}")]
    InvalidFeature { feature: &'static str, value: f64 },

    /// `transform` was called on a standardizer that was never fitted.
    #[error("standardizer used before it was fitted")]
    ScalerNotFitted,

    #[error("result count must be at least 1")]
    InvalidCount,

    #[error(transparent)]
    Core(sonority_core::Error),
}

impl From<sonority_core::Error> for SearchError {
    fn from(err: sonority_core::Error) -> Self {
        match err {
            sonority_core::Error::MissingFeature { feature } => Self::MissingFeature { feature },
            sonority_core::Error::InvalidFeature { feature, value } => {
                Self::InvalidFeature { feature, value }
            }
            other => Self::Core(other),
        }
    }
}

impl SearchError {
    /// Returns `true` when the error should abort process startup or a
    /// build job rather than fail a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Build(_) | Self::Load(_))
    }
}

/// Convenience alias for search results.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
