//! Batch construction of a [`Model`] from training rows.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use sonority_core::{CatalogRecord, Feature, FeatureVector, FEATURE_COUNT};

use crate::ann::{AnnIndex, DEFAULT_LEAF_SIZE};
use crate::error::BuildError;
use crate::metadata::Metadata;
use crate::model::Model;
use crate::scaler::Standardizer;
use crate::weighting::FeatureWeighter;

/// Default number of trees in the forest.
pub const DEFAULT_TREE_COUNT: usize = 50;

/// Default number of rows weighted per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// One dataset row: raw features plus release year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub features: FeatureVector,
    pub year: u16,
}

impl TrainingRow {
    #[must_use]
    pub const fn new(features: FeatureVector, year: u16) -> Self {
        Self { features, year }
    }
}

/// Knobs for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// More trees improve recall at the cost of build time and memory.
    pub tree_count: usize,
    /// Seed for tree construction. A random seed is drawn when absent.
    pub seed: Option<u64>,
    pub leaf_size: usize,
    /// Rows weighted per chunk. Only affects peak memory, never output.
    pub chunk_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tree_count: DEFAULT_TREE_COUNT,
            seed: None,
            leaf_size: DEFAULT_LEAF_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BuildOptions {
    #[must_use]
    pub const fn with_tree_count(mut self, tree_count: usize) -> Self {
        self.tree_count = tree_count;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Accumulates weighted rows chunk by chunk, then fits the standardizer
/// and builds the index in one pass.
///
/// Ids are assigned `0..n` in the order rows were pushed.
#[derive(Debug)]
pub struct IndexBuilder {
    options: BuildOptions,
    weighter: FeatureWeighter,
    weighted: Vec<[f64; FEATURE_COUNT]>,
    years: Vec<u16>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            weighter: FeatureWeighter::new(),
            weighted: Vec::new(),
            years: Vec::new(),
        }
    }

    /// Build a model from rows already in memory, weighting them in chunks.
    pub fn build(rows: &[TrainingRow], options: BuildOptions) -> Result<Model, BuildError> {
        let mut builder = Self::new(options);
        for chunk in rows.chunks(options.chunk_size.max(1)) {
            builder.push_chunk(chunk)?;
        }
        builder.finish()
    }

    #[must_use]
    pub const fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weighted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weighted.is_empty()
    }

    /// Weight and append one chunk of rows.
    pub fn push_chunk(&mut self, rows: &[TrainingRow]) -> Result<(), BuildError> {
        self.weighted.reserve(rows.len());
        self.years.reserve(rows.len());
        for row in rows {
            let position = self.weighted.len();
            for feature in Feature::ALL {
                let value = row.features.get(feature);
                if !value.is_finite() {
                    return Err(BuildError::InvalidFeature {
                        row: position,
                        feature: feature.name(),
                        value,
                    });
                }
            }
            self.weighted.push(self.weighter.weight(&row.features));
            self.years.push(row.year);
        }
        log::debug!("Weighted {} rows ({} total)", rows.len(), self.weighted.len());
        Ok(())
    }

    /// Fit the standardizer over every accepted row and build the index.
    pub fn finish(self) -> Result<Model, BuildError> {
        if self.weighted.is_empty() {
            return Err(BuildError::EmptyDataset);
        }
        if self.options.tree_count == 0 {
            return Err(BuildError::NoTrees);
        }
        if u32::try_from(self.weighted.len()).is_err() {
            return Err(BuildError::TooManyRows {
                rows: self.weighted.len(),
            });
        }

        let mut standardizer = Standardizer::new();
        let scaler = standardizer.fit(&self.weighted)?;
        log::info!(
            "Fitted scaler over {} rows (mean {:?}, std {:?})",
            self.weighted.len(),
            scaler.mean,
            scaler.std
        );

        let mut vectors = Vec::with_capacity(self.weighted.len());
        let mut metadata = Metadata::new();
        for (id, (row, year)) in self.weighted.iter().zip(&self.years).enumerate() {
            let scaled = scaler.transform(row);
            let record = CatalogRecord::new(id as u32, scaled, *year);
            if let Some(feature) = Feature::ALL
                .into_iter()
                .find(|f| !record.features[f.index()].is_finite())
            {
                return Err(BuildError::InvalidFeature {
                    row: id,
                    feature: feature.name(),
                    value: row[feature.index()],
                });
            }
            vectors.push(record.features);
            metadata.insert(record);
        }

        let seed = self.options.seed.unwrap_or_else(rand::random);
        log::info!(
            "Building {} trees over {} items (seed {})",
            self.options.tree_count,
            vectors.len(),
            seed
        );
        let index = AnnIndex::build_with_leaf_size(
            vectors,
            self.options.tree_count,
            seed,
            self.options.leaf_size,
        );

        Ok(Model::new(index, scaler, metadata, Utc::now()))
    }
}
