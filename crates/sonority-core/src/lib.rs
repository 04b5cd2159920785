//! Core domain model for sonority.
//!
//! This crate defines the fixed four-dimensional musical feature space,
//! the per-feature weight table, catalog records and recommendation
//! types, plus the SQLite catalog store that mirrors the index id space.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
pub use model::{
    CatalogRecord, Feature, FeatureBreakdown, FeatureVector, Recommendation, RecommendResponse,
    Song, FEATURE_COUNT,
};
