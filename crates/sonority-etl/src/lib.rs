//! Offline side of sonority: dataset ingestion, model builds, feature
//! sources and configuration.
//!
//! A build reads the dataset CSV in chunks, feeds each chunk to
//! [`sonority_search::IndexBuilder`], optionally mirrors the song rows into
//! the SQLite catalog, and saves the model directory in one atomic swap.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod build;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;

pub use build::{build_model, build_model_with_catalog, import_catalog, BuildSummary};
pub use config::{Config, LoggingConfig};
pub use dataset::{DatasetReader, DatasetRow, REQUIRED_COLUMNS};
pub use error::{EtlError, EtlResult};
pub use features::{FeatureSource, StaticFeatureSource, WithFallback};
