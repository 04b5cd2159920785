//! Fixed per-feature weighting and tempo normalization.

use std::collections::HashMap;

use sonority_core::{Feature, FeatureVector, FEATURE_COUNT};

use crate::error::SearchResult;

/// Lower bound of the tempo range, in BPM.
pub const MIN_TEMPO: f64 = 50.0;
/// Upper bound of the tempo range, in BPM.
pub const MAX_TEMPO: f64 = 200.0;

/// Min-max normalize a tempo into `0.0..=1.0`, clamping out-of-range values.
#[must_use]
pub fn normalize_tempo(tempo: f64) -> f64 {
    ((tempo - MIN_TEMPO) / (MAX_TEMPO - MIN_TEMPO)).clamp(0.0, 1.0)
}

/// Applies the weight table to raw feature vectors.
///
/// The same weighter runs over every training row and every query, so the
/// two always land in the same space.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureWeighter;

impl FeatureWeighter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Normalize tempo, then multiply each feature by its weight.
    #[must_use]
    pub fn weight(&self, raw: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut weighted = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let value = match feature {
                Feature::Tempo => normalize_tempo(raw.tempo),
                _ => raw.get(feature),
            };
            weighted[feature.index()] = value * feature.weight();
        }
        weighted
    }

    /// Weight a feature dictionary, failing if any of the four keys is
    /// absent.
    pub fn weight_map(&self, raw: &HashMap<String, f64>) -> SearchResult<[f64; FEATURE_COUNT]> {
        let vector = FeatureVector::from_map(raw)?;
        Ok(self.weight(&vector))
    }
}
