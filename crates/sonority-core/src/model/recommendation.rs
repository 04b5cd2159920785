use serde::{Deserialize, Serialize};

use crate::model::features::{Feature, FEATURE_COUNT};

/// Per-feature similarity between a query and a candidate.
///
/// Each value is `1 - |query - candidate|` over standardized coordinates.
/// Values are signed: two items more than one scaled unit apart on a
/// feature score below zero on that feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBreakdown {
    pub acousticness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
}

impl FeatureBreakdown {
    #[must_use]
    pub const fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            acousticness: values[0],
            liveness: values[1],
            valence: values[2],
            tempo: values[3],
        }
    }

    #[must_use]
    pub const fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Acousticness => self.acousticness,
            Feature::Liveness => self.liveness,
            Feature::Valence => self.valence,
            Feature::Tempo => self.tempo,
        }
    }
}

/// One ranked result of a recommend query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Catalog id (same id space as the catalog store).
    pub id: u32,
    /// Final ranking score: geometric similarity, times the temporal
    /// decay when the query carried a year.
    pub score: f64,
    /// Geometric similarity `1 / (1 + distance)` before any decay.
    pub similarity: f64,
    pub breakdown: FeatureBreakdown,
}

/// Column-oriented form of a result list, as handed to API callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub ids: Vec<u32>,
    pub combined_scores: Vec<f64>,
    pub per_feature_breakdown: Vec<FeatureBreakdown>,
}

impl From<&[Recommendation]> for RecommendResponse {
    fn from(recommendations: &[Recommendation]) -> Self {
        Self {
            ids: recommendations.iter().map(|r| r.id).collect(),
            combined_scores: recommendations.iter().map(|r| r.score).collect(),
            per_feature_breakdown: recommendations.iter().map(|r| r.breakdown).collect(),
        }
    }
}

impl From<Vec<Recommendation>> for RecommendResponse {
    fn from(recommendations: Vec<Recommendation>) -> Self {
        Self::from(recommendations.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_columns_keep_order() {
        let recs = vec![
            Recommendation {
                id: 4,
                score: 0.9,
                similarity: 0.9,
                breakdown: FeatureBreakdown::from_array([1.0, 0.5, 0.0, -0.25]),
            },
            Recommendation {
                id: 1,
                score: 0.4,
                similarity: 0.8,
                breakdown: FeatureBreakdown::from_array([0.0; 4]),
            },
        ];
        let response = RecommendResponse::from(recs);
        assert_eq!(response.ids, vec![4, 1]);
        assert_eq!(response.combined_scores, vec![0.9, 0.4]);
        assert_eq!(response.per_feature_breakdown[0].tempo, -0.25);
    }

    #[test]
    fn test_breakdown_serializes_by_feature_name() {
        let breakdown = FeatureBreakdown::from_array([0.1, 0.2, 0.3, 0.4]);
        let json = serde_json::to_value(breakdown).unwrap();
        assert_eq!(json["valence"], 0.3);
        assert_eq!(breakdown.get(Feature::Liveness), 0.2);
    }
}
