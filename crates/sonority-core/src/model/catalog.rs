use serde::{Deserialize, Serialize};

use crate::model::features::FEATURE_COUNT;

/// A catalog item as held by the search index metadata.
///
/// `id` is the dense, 0-based row position the item had in the training
/// dataset. `features` is the item's standardized (weighted, then scaled)
/// vector, kept so a query can report per-feature similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: u32,
    pub features: [f32; FEATURE_COUNT],
    pub year: u16,
}

impl CatalogRecord {
    #[must_use]
    pub fn new(id: u32, features: [f64; FEATURE_COUNT], year: u16) -> Self {
        Self {
            id,
            features: features.map(|v| v as f32),
            year,
        }
    }

    /// The stored features widened back to `f64`.
    #[must_use]
    pub fn features_f64(&self) -> [f64; FEATURE_COUNT] {
        self.features.map(f64::from)
    }
}

/// A song row in the catalog store.
///
/// Shares its `id` with the [`CatalogRecord`] built from the same dataset
/// row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: u32,
    pub name: String,
    /// Artist credit as it appeared in the dataset.
    pub artists: String,
    pub year: u16,
    pub popularity: f64,
}

impl Song {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, artists: impl Into<String>, year: u16) -> Self {
        Self {
            id,
            name: name.into(),
            artists: artists.into(),
            year,
            popularity: 0.0,
        }
    }

    #[must_use]
    pub const fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_narrows_to_f32() {
        let record = CatalogRecord::new(3, [0.25, -1.5, 2.0, 0.125], 1999);
        assert_eq!(record.features, [0.25_f32, -1.5, 2.0, 0.125]);
        assert_eq!(record.features_f64(), [0.25, -1.5, 2.0, 0.125]);
    }

    #[test]
    fn test_song_builder() {
        let song = Song::new(7, "Blue in Green", "Miles Davis", 1959).with_popularity(61.0);
        assert_eq!(song.id, 7);
        assert_eq!(song.popularity, 61.0);
    }
}
