//! Zero-mean, unit-variance standardization.

use serde::{Deserialize, Serialize};
use sonority_core::FEATURE_COUNT;

use crate::error::{BuildError, SearchError, SearchResult};

/// Frozen per-feature mean and standard deviation.
///
/// Fitted once over the full weighted training matrix and never refit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

impl ScalerState {
    /// Fit over every row of `matrix`.
    ///
    /// Uses the population standard deviation. A column with zero variance
    /// gets a standard deviation of 1 so it passes through centered but
    /// unscaled.
    pub fn fit(matrix: &[[f64; FEATURE_COUNT]]) -> Result<Self, BuildError> {
        if matrix.is_empty() {
            return Err(BuildError::EmptyDataset);
        }
        let count = matrix.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in matrix {
            for (m, value) in mean.iter_mut().zip(row) {
                *m += value;
            }
        }
        for m in &mut mean {
            *m /= count;
        }

        let mut variance = [0.0; FEATURE_COUNT];
        for row in matrix {
            for ((v, value), m) in variance.iter_mut().zip(row).zip(&mean) {
                let diff = value - m;
                *v += diff * diff;
            }
        }
        let std = variance.map(|v| {
            let std = (v / count).sqrt();
            if std > 0.0 && std.is_finite() {
                std
            } else {
                1.0
            }
        });

        Ok(Self { mean, std })
    }

    /// `(x - mean) / std` per dimension.
    #[must_use]
    pub fn transform(&self, vector: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (i, out) in scaled.iter_mut().enumerate() {
            *out = (vector[i] - self.mean[i]) / self.std[i];
        }
        scaled
    }
}

/// A standardizer that must be fitted before it can transform.
#[derive(Debug, Clone, Default)]
pub struct Standardizer {
    state: Option<ScalerState>,
}

impl Standardizer {
    #[must_use]
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Wrap an already-fitted state, e.g. one read back from disk.
    #[must_use]
    pub const fn from_state(state: ScalerState) -> Self {
        Self { state: Some(state) }
    }

    /// Fit over `matrix`. A standardizer is fitted at most once; fitting
    /// again replaces the state, which is only done by a fresh build.
    pub fn fit(&mut self, matrix: &[[f64; FEATURE_COUNT]]) -> Result<ScalerState, BuildError> {
        let state = ScalerState::fit(matrix)?;
        self.state = Some(state);
        Ok(state)
    }

    pub fn transform(&self, vector: &[f64; FEATURE_COUNT]) -> SearchResult<[f64; FEATURE_COUNT]> {
        self.state
            .as_ref()
            .map(|state| state.transform(vector))
            .ok_or(SearchError::ScalerNotFitted)
    }

    #[must_use]
    pub const fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_mean_and_std() {
        let matrix = [
            [1.0, 10.0, 0.0, 5.0],
            [2.0, 20.0, 0.0, 5.0],
            [3.0, 30.0, 0.0, 5.0],
        ];
        let state = ScalerState::fit(&matrix).unwrap();
        assert!((state.mean[0] - 2.0).abs() < 1e-12);
        assert!((state.mean[1] - 20.0).abs() < 1e-12);
        assert!((state.std[0] - (2.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((state.std[1] - (200.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_column_uses_unit_std() {
        let matrix = [[0.0, 1.0, 2.0, 7.0], [1.0, 2.0, 3.0, 7.0]];
        let state = ScalerState::fit(&matrix).unwrap();
        assert_eq!(state.std[3], 1.0);
        let scaled = state.transform(&[0.5, 1.5, 2.5, 7.0]);
        assert_eq!(scaled[3], 0.0);
    }

    #[test]
    fn test_fit_empty_matrix_fails() {
        assert!(matches!(
            ScalerState::fit(&[]),
            Err(BuildError::EmptyDataset)
        ));
    }

    #[test]
    fn test_transform_standardizes_training_columns() {
        let matrix = [
            [0.1, 0.9, 0.3, 0.2],
            [0.5, 0.1, 0.8, 0.6],
            [0.9, 0.4, 0.2, 0.9],
            [0.3, 0.6, 0.7, 0.1],
        ];
        let state = ScalerState::fit(&matrix).unwrap();
        let scaled: Vec<_> = matrix.iter().map(|row| state.transform(row)).collect();
        for col in 0..FEATURE_COUNT {
            let mean: f64 = scaled.iter().map(|r| r[col]).sum::<f64>() / 4.0;
            let var: f64 = scaled.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let standardizer = Standardizer::new();
        assert!(!standardizer.is_fitted());
        assert!(matches!(
            standardizer.transform(&[0.0; FEATURE_COUNT]),
            Err(SearchError::ScalerNotFitted)
        ));
    }

    #[test]
    fn test_transform_after_fit() {
        let mut standardizer = Standardizer::new();
        standardizer
            .fit(&[[0.0, 0.0, 0.0, 0.0], [2.0, 2.0, 2.0, 2.0]])
            .unwrap();
        let scaled = standardizer.transform(&[2.0, 0.0, 1.0, 2.0]).unwrap();
        assert_eq!(scaled, [1.0, -1.0, 0.0, 1.0]);
    }
}
