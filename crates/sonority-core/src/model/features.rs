use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Number of dimensions in the feature space.
pub const FEATURE_COUNT: usize = 4;

/// One dimension of the musical feature space.
///
/// The declaration order is the dimension order used everywhere a feature
/// vector is flattened into an array: at build time, on disk, and at query
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Acousticness,
    Liveness,
    Valence,
    Tempo,
}

impl Feature {
    /// All features in dimension order.
    pub const ALL: [Self; FEATURE_COUNT] = [
        Self::Acousticness,
        Self::Liveness,
        Self::Valence,
        Self::Tempo,
    ];

    /// The column / key name of this feature.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Acousticness => "acousticness",
            Self::Liveness => "liveness",
            Self::Valence => "valence",
            Self::Tempo => "tempo",
        }
    }

    /// The fixed multiplier applied to this feature before standardization.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Acousticness => 1.2,
            Self::Liveness => 0.8,
            Self::Valence => 1.5,
            Self::Tempo => 1.0,
        }
    }

    /// Position of this feature in a flattened vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw (unweighted, unscaled) audio features of a track.
///
/// Tempo is in beats per minute; the other three are in their natural
/// `0.0..=1.0` domain, although nothing here enforces that range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub acousticness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
}

impl FeatureVector {
    /// The vector an upstream feature extractor substitutes when it cannot
    /// produce real features for a track.
    pub const FALLBACK: Self = Self {
        acousticness: 0.5,
        liveness: 0.2,
        valence: 0.5,
        tempo: 120.0,
    };

    #[must_use]
    pub const fn new(acousticness: f64, liveness: f64, valence: f64, tempo: f64) -> Self {
        Self {
            acousticness,
            liveness,
            valence,
            tempo,
        }
    }

    /// Build a vector from a key/value map, requiring all four keys.
    ///
    /// Extra keys are ignored.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let value = map
                .get(feature.name())
                .copied()
                .ok_or(Error::MissingFeature {
                    feature: feature.name(),
                })?;
            values[feature.index()] = value;
        }
        let vector = Self::from_array(values);
        vector.validate()?;
        Ok(vector)
    }

    #[must_use]
    pub const fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Flatten into dimension order.
    #[must_use]
    pub const fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [self.acousticness, self.liveness, self.valence, self.tempo]
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

    /// Reject NaN and infinite components.
    pub fn validate(&self) -> Result<()> {
        for feature in Feature::ALL {
            let value = self.get(feature);
            if !value.is_finite() {
                return Err(Error::InvalidFeature {
                    feature: feature.name(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Component-wise average of several raw vectors.
    ///
    /// Used to build a listener profile out of a handful of tracks.
    pub fn mean(vectors: &[Self]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(Error::InvalidData(
                "cannot average an empty set of feature vectors".to_string(),
            ));
        }
        let mut sums = [0.0; FEATURE_COUNT];
        for vector in vectors {
            for (sum, value) in sums.iter_mut().zip(vector.to_array()) {
                *sum += value;
            }
        }
        let count = vectors.len() as f64;
        Ok(Self::from_array(sums.map(|sum| sum / count)))
    }
}
