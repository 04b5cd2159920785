//! Similarity search for sonority.
//!
//! Turns raw audio features into a weighted, standardized space, indexes
//! the catalog with a forest of random-projection trees over angular
//! distance, and answers "more like this" queries with a temporal rerank.
//!
//! Build time: [`IndexBuilder`] → [`Model::save`].
//! Query time: [`Model::load`] → [`Engine::recommend`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod ann;
pub mod builder;
pub mod engine;
pub mod error;
pub mod handle;
pub mod metadata;
pub mod model;
pub mod persistence;
pub mod scaler;
pub mod weighting;

pub use ann::AnnIndex;
pub use builder::{BuildOptions, IndexBuilder, TrainingRow};
pub use engine::{search_depth, temporal_decay, Engine, EngineStats};
pub use error::{BuildError, LoadError, SearchError, SearchResult};
pub use handle::ModelHandle;
pub use metadata::Metadata;
pub use model::Model;
pub use scaler::{ScalerState, Standardizer};
pub use weighting::{normalize_tempo, FeatureWeighter};
