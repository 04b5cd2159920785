//! Error types for dataset ingestion and model builds.

use thiserror::Error;

/// Errors that can occur while reading a dataset or running a build.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A required column is absent from the dataset header.
    #[error("dataset is missing required column: {column}")]
    MissingColumn { column: &'static str },

    /// A cell could not be parsed.
    #[error("line {line}: invalid {column} value {value:?}")]
    MalformedRow {
        line: u64,
        column: &'static str,
        value: String,
    },

    /// An error propagated from the CSV reader.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model build or save failed.
    #[error("build failed: {0}")]
    Build(#[from] sonority_search::BuildError),

    /// An error propagated from the core domain layer.
    #[error("catalog error: {0}")]
    Catalog(#[from] sonority_core::Error),

    /// A feature source could not produce features for a track.
    #[error("{source_name} has no usable features for {track_id}: {message}")]
    Extraction {
        source_name: String,
        track_id: String,
        message: String,
    },
}

impl EtlError {
    /// Returns `true` when the dataset itself is malformed, as opposed to
    /// an environment failure such as I/O.
    pub fn is_dataset_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::MalformedRow { .. } | Self::Csv(_)
        )
    }
}

/// Convenience alias for ETL results.
pub type EtlResult<T> = std::result::Result<T, EtlError>;
