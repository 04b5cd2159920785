//! The recommend pipeline over a loaded model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use sonority_core::{Feature, FeatureBreakdown, FeatureVector, Recommendation, FEATURE_COUNT};

use crate::error::{LoadError, SearchError, SearchResult};
use crate::model::Model;
use crate::scaler::Standardizer;
use crate::weighting::FeatureWeighter;

/// Candidates fetched per requested result, to absorb metadata misses.
pub const OVERFETCH_FACTOR: usize = 2;

/// Search depth granted per requested result.
pub const SEARCH_DEPTH_PER_RESULT: usize = 50;

/// Upper bound on search depth, bounding worst-case query latency.
pub const MAX_SEARCH_DEPTH: usize = 10_000;

/// Year gap over which the temporal factor falls by `1/e`.
pub const DECAY_YEARS: f64 = 10.0;

/// How many candidate ids a query may gather for `n` results.
#[must_use]
pub fn search_depth(n: usize) -> usize {
    n.saturating_mul(SEARCH_DEPTH_PER_RESULT)
        .min(MAX_SEARCH_DEPTH)
}

/// `exp(-|a - b| / 10)`: 1 for the same year, decaying with the gap.
#[must_use]
pub fn temporal_decay(a: u16, b: u16) -> f64 {
    (-f64::from(a.abs_diff(b)) / DECAY_YEARS).exp()
}

/// Map an angular distance onto `(0, 1]`.
#[must_use]
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// `1 - |q - c|` per standardized dimension. Not clamped.
#[must_use]
pub fn feature_similarity(
    query: &[f64; FEATURE_COUNT],
    candidate: &[f64; FEATURE_COUNT],
) -> FeatureBreakdown {
    let mut values = [0.0; FEATURE_COUNT];
    for (i, value) in values.iter_mut().enumerate() {
        *value = 1.0 - (query[i] - candidate[i]).abs();
    }
    FeatureBreakdown::from_array(values)
}

/// A loaded, immutable model ready to answer queries.
///
/// Queries take `&self` and never mutate the model, so one engine can be
/// shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct Engine {
    model: Model,
    weighter: FeatureWeighter,
    standardizer: Standardizer,
}

impl Engine {
    #[must_use]
    pub fn new(model: Model) -> Self {
        let standardizer = Standardizer::from_state(*model.scaler());
        Self {
            model,
            weighter: FeatureWeighter::new(),
            standardizer,
        }
    }

    /// Load the model in `dir` and wrap it in an engine.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        Model::load(dir).map(Self::new)
    }

    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Weight, then standardize raw features into index space.
    ///
    /// Fails with [`SearchError::InvalidFeature`] when a finite input still
    /// lands outside the `f32` range the index stores.
    pub fn prepare_query(&self, features: &FeatureVector) -> SearchResult<[f64; FEATURE_COUNT]> {
        features.validate()?;
        let weighted = self.weighter.weight(features);
        let scaled = self.standardizer.transform(&weighted)?;
        for feature in Feature::ALL {
            if !(scaled[feature.index()] as f32).is_finite() {
                return Err(SearchError::InvalidFeature {
                    feature: feature.name(),
                    value: features.get(feature),
                });
            }
        }
        Ok(scaled)
    }

    /// Up to `n` catalog items most similar to `features`, best first.
    ///
    /// When `year` is given each candidate's similarity is multiplied by
    /// [`temporal_decay`]; otherwise the score is the plain similarity.
    /// Candidates the index returns but the metadata lacks are skipped, so
    /// the result can be shorter than `n`.
    pub fn recommend(
        &self,
        features: &FeatureVector,
        year: Option<u16>,
        n: usize,
    ) -> SearchResult<Vec<Recommendation>> {
        if n == 0 {
            return Err(SearchError::InvalidCount);
        }
        let scaled = self.prepare_query(features)?;
        let query = scaled.map(|v| v as f32);

        let candidates = self.model.index().query(
            &query,
            n.saturating_mul(OVERFETCH_FACTOR),
            search_depth(n),
        );

        let mut recommendations = Vec::with_capacity(candidates.len());
        for (id, distance) in candidates {
            let Some(record) = self.model.metadata().get(id) else {
                log::debug!("Skipping candidate {} with no metadata", id);
                continue;
            };

            let similarity = distance_to_similarity(f64::from(distance));
            let mut score = similarity;
            if let Some(year) = year {
                score *= temporal_decay(year, record.year);
            }

            recommendations.push(Recommendation {
                id,
                score,
                similarity,
                breakdown: feature_similarity(&scaled, &record.features_f64()),
            });
        }

        recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
        recommendations.truncate(n);
        Ok(recommendations)
    }

    /// [`Engine::recommend`] over a feature dictionary.
    pub fn recommend_map(
        &self,
        features: &HashMap<String, f64>,
        year: Option<u16>,
        n: usize,
    ) -> SearchResult<Vec<Recommendation>> {
        let features = FeatureVector::from_map(features)?;
        self.recommend(&features, year, n)
    }

    /// Recommend from the average of several tracks, ignoring release
    /// years.
    pub fn recommend_profile(
        &self,
        tracks: &[FeatureVector],
        n: usize,
    ) -> SearchResult<Vec<Recommendation>> {
        let profile = FeatureVector::mean(tracks)?;
        self.recommend(&profile, None, n)
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let index = self.model.index();
        let scaler = self.model.scaler();
        EngineStats {
            items: index.len(),
            trees: index.tree_count(),
            nodes: index.node_count(),
            leaf_size: index.leaf_size(),
            seed: index.seed(),
            mean: scaler.mean,
            std: scaler.std,
            year_range: self.model.metadata().year_range(),
            built_at: self.model.built_at(),
        }
    }
}

/// A summary of a loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub items: usize,
    pub trees: usize,
    pub nodes: usize,
    pub leaf_size: usize,
    pub seed: u64,
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
    pub year_range: Option<(u16, u16)>,
    pub built_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOptions, IndexBuilder, TrainingRow};

    /// A small pseudo-random catalog, identical on every run.
    fn catalog_rows(count: usize) -> Vec<TrainingRow> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 10_000) as f64 / 10_000.0
        };
        (0..count)
            .map(|_| {
                let features =
                    FeatureVector::new(next(), next() * 0.6, next(), 60.0 + next() * 140.0);
                let year = 1950 + (next() * 70.0) as u16;
                TrainingRow::new(features, year)
            })
            .collect()
    }

    fn engine(rows: &[TrainingRow]) -> Engine {
        let model =
            IndexBuilder::build(rows, BuildOptions::default().with_tree_count(20).with_seed(17))
                .unwrap();
        Engine::new(model)
    }

    #[test]
    fn test_temporal_decay() {
        for year in [1900, 1999, 2024] {
            assert_eq!(temporal_decay(year, year), 1.0);
        }
        assert!((temporal_decay(2010, 2020) - (-1.0_f64).exp()).abs() < 1e-12);
        assert!((temporal_decay(2010, 2020) - 0.3679).abs() < 1e-4);
        assert_eq!(temporal_decay(2020, 2010), temporal_decay(2010, 2020));
        let mut previous = 1.0;
        for gap in 1..50 {
            let decay = temporal_decay(2000, 2000 + gap);
            assert!(decay < previous);
            previous = decay;
        }
    }

    #[test]
    fn test_search_depth() {
        assert_eq!(search_depth(1), 50);
        assert_eq!(search_depth(10), 500);
        assert_eq!(search_depth(200), 10_000);
        assert_eq!(search_depth(100_000), 10_000);
    }

    #[test]
    fn test_feature_similarity_is_signed() {
        let breakdown = feature_similarity(&[0.0, 1.0, -2.0, 0.5], &[0.0, 0.5, 1.0, 0.5]);
        assert_eq!(breakdown.acousticness, 1.0);
        assert_eq!(breakdown.liveness, 0.5);
        assert_eq!(breakdown.valence, -2.0);
        assert_eq!(breakdown.tempo, 1.0);
    }

    #[test]
    fn test_result_length_and_ids() {
        let rows = catalog_rows(300);
        let engine = engine(&rows);
        for n in [1, 5, 10, 25] {
            let results = engine
                .recommend(&FeatureVector::FALLBACK, Some(1990), n)
                .unwrap();
            assert!(!results.is_empty());
            assert!(results.len() <= n);
            for rec in &results {
                assert!(engine.model().metadata().contains(rec.id));
            }
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let rows = catalog_rows(200);
        let engine = engine(&rows);
        let query = FeatureVector::new(0.2, 0.1, 0.8, 128.0);
        let first = engine.recommend(&query, Some(2001), 10).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.recommend(&query, Some(2001), 10).unwrap(), first);
        }
    }

    #[test]
    fn test_item_finds_itself() {
        let rows = catalog_rows(300);
        let engine = engine(&rows);
        for id in [0_usize, 42, 150, 299] {
            let results = engine.recommend(&rows[id].features, None, 5).unwrap();
            let ids: Vec<u32> = results.iter().map(|r| r.id).collect();
            assert!(ids.contains(&(id as u32)), "item {id} not in {ids:?}");
        }
    }

    #[test]
    fn test_no_year_means_no_decay() {
        let rows = catalog_rows(200);
        let engine = engine(&rows);
        let query = FeatureVector::new(0.7, 0.3, 0.2, 95.0);

        let plain = engine.recommend(&query, None, 10).unwrap();
        for rec in &plain {
            assert_eq!(rec.score, rec.similarity);
        }

        let decayed = engine.recommend(&query, Some(1900), 10).unwrap();
        assert!(decayed.iter().all(|rec| rec.score < rec.similarity));
    }

    #[test]
    fn test_year_reranks_candidates() {
        let rows = catalog_rows(200);
        let engine = engine(&rows);
        let query = FeatureVector::new(0.4, 0.2, 0.6, 120.0);
        for rec in engine.recommend(&query, Some(1975), 10).unwrap() {
            let year = engine.model().metadata().get(rec.id).unwrap().year;
            let expected = rec.similarity * temporal_decay(1975, year);
            assert!((rec.score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tempo_twins_rank_adjacent() {
        let mut rows = catalog_rows(200);
        let twin = FeatureVector::new(0.83, 0.05, 0.12, 141.0);
        rows.push(TrainingRow::new(twin, 1984));
        rows.push(TrainingRow::new(
            FeatureVector {
                tempo: 142.0,
                ..twin
            },
            1984,
        ));
        let engine = engine(&rows);

        for query in [rows[200].features, rows[201].features] {
            let results = engine.recommend(&query, None, 10).unwrap();
            let ids: Vec<u32> = results.iter().take(2).map(|r| r.id).collect();
            assert!(ids.contains(&200) && ids.contains(&201), "got {ids:?}");
        }
    }

    #[test]
    fn test_missing_metadata_is_skipped() {
        let rows = catalog_rows(100);
        let mut model =
            IndexBuilder::build(&rows, BuildOptions::default().with_tree_count(10).with_seed(4))
                .unwrap();
        model.metadata_mut().remove(7);
        let engine = Engine::new(model);

        let results = engine.recommend(&rows[7].features, None, 10).unwrap();
        assert!(results.len() <= 10);
        assert!(results.iter().all(|rec| rec.id != 7));
    }

    #[test]
    fn test_missing_feature_key() {
        let engine = engine(&catalog_rows(50));
        let features = HashMap::from([
            ("acousticness".to_string(), 0.5),
            ("valence".to_string(), 0.5),
            ("tempo".to_string(), 110.0),
        ]);
        let err = engine.recommend_map(&features, None, 5).unwrap_err();
        assert!(matches!(err, SearchError::MissingFeature { feature: "liveness" }));
    }

    #[test]
    fn test_zero_count_rejected() {
        let engine = engine(&catalog_rows(20));
        let err = engine
            .recommend(&FeatureVector::FALLBACK, None, 0)
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidCount));
    }

    #[test]
    fn test_query_outside_index_range_rejected() {
        let engine = engine(&catalog_rows(50));
        let err = engine
            .recommend(&FeatureVector::new(1e300, 0.2, 0.5, 120.0), None, 5)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::InvalidFeature {
                feature: "acousticness",
                ..
            }
        ));
    }

    #[test]
    fn test_tied_candidates_keep_id_order() {
        let rows: Vec<TrainingRow> = (0..12)
            .map(|_| TrainingRow::new(FeatureVector::new(0.4, 0.2, 0.6, 110.0), 2001))
            .collect();
        let engine = engine(&rows);
        let results = engine
            .recommend(&FeatureVector::new(0.4, 0.2, 0.6, 110.0), Some(2001), 5)
            .unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        for rec in &results {
            assert_eq!(rec.score, results[0].score);
        }
    }

    #[test]
    fn test_profile_matches_mean_query() {
        let rows = catalog_rows(120);
        let engine = engine(&rows);
        let tracks = [rows[1].features, rows[2].features, rows[3].features];
        let profile = engine.recommend_profile(&tracks, 8).unwrap();
        let mean = FeatureVector::mean(&tracks).unwrap();
        assert_eq!(profile, engine.recommend(&mean, None, 8).unwrap());
        assert!(engine.recommend_profile(&[], 8).is_err());
    }

    #[test]
    fn test_stats() {
        let rows = catalog_rows(64);
        let stats = engine(&rows).stats();
        assert_eq!(stats.items, 64);
        assert_eq!(stats.trees, 20);
        assert_eq!(stats.seed, 17);
        let (min, max) = stats.year_range.unwrap();
        assert!(min <= max);
    }
}
