//! Feature sources: where a query's audio features come from.
//!
//! Upstream feature providers are frequently incomplete. Callers that must
//! always produce a query wrap their source in [`WithFallback`], which
//! substitutes [`FeatureVector::FALLBACK`] when a lookup fails.

use std::collections::HashMap;
use std::path::Path;

use sonority_core::FeatureVector;

use crate::error::{EtlError, EtlResult};

/// Anything that can look up audio features by an external track id.
pub trait FeatureSource {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Features for one track.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Extraction`] when the source has no complete,
    /// finite feature set for the track.
    fn features_for(&self, track_id: &str) -> EtlResult<FeatureVector>;
}

/// An in-memory feature table, typically loaded from a JSON file of the
/// form `{"track-id": {"acousticness": 0.5, ...}, ...}`.
///
/// Entries are stored as given and validated on lookup, so an incomplete
/// entry behaves like a failed upstream request.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureSource {
    tracks: HashMap<String, HashMap<String, f64>>,
}

impl StaticFeatureSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a feature table from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EtlResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let tracks: HashMap<String, HashMap<String, f64>> = serde_json::from_str(&contents)
            .map_err(|e| EtlError::Extraction {
                source_name: path.display().to_string(),
                track_id: String::new(),
                message: e.to_string(),
            })?;
        log::debug!("Loaded features for {} tracks from {}", tracks.len(), path.display());
        Ok(Self { tracks })
    }

    /// Add or replace one track's raw feature map.
    pub fn insert(&mut self, track_id: impl Into<String>, features: HashMap<String, f64>) {
        self.tracks.insert(track_id.into(), features);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FeatureSource for StaticFeatureSource {
    fn name(&self) -> &str {
        "static"
    }

    fn features_for(&self, track_id: &str) -> EtlResult<FeatureVector> {
        let raw = self
            .tracks
            .get(track_id)
            .ok_or_else(|| EtlError::Extraction {
                source_name: self.name().to_string(),
                track_id: track_id.to_string(),
                message: "unknown track".to_string(),
            })?;
        FeatureVector::from_map(raw).map_err(|e| EtlError::Extraction {
            source_name: self.name().to_string(),
            track_id: track_id.to_string(),
            message: e.to_string(),
        })
    }
}

/// Wraps a source so that lookups never fail.
#[derive(Debug, Clone)]
pub struct WithFallback<S> {
    inner: S,
    fallback: FeatureVector,
}

impl<S: FeatureSource> WithFallback<S> {
    /// Fall back to [`FeatureVector::FALLBACK`].
    pub const fn new(inner: S) -> Self {
        Self::with_fallback(inner, FeatureVector::FALLBACK)
    }

    pub const fn with_fallback(inner: S, fallback: FeatureVector) -> Self {
        Self { inner, fallback }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Features for `track_id`, or the fallback vector when the wrapped
    /// source fails.
    pub fn resolve(&self, track_id: &str) -> FeatureVector {
        match self.inner.features_for(track_id) {
            Ok(features) => features,
            Err(e) => {
                log::info!("Using fallback features for {track_id}: {e}");
                self.fallback
            }
        }
    }
}

impl<S: FeatureSource> FeatureSource for WithFallback<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn features_for(&self, track_id: &str) -> EtlResult<FeatureVector> {
        Ok(self.resolve(track_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn source() -> StaticFeatureSource {
        let mut source = StaticFeatureSource::new();
        source.insert(
            "complete",
            map(&[
                ("acousticness", 0.9),
                ("liveness", 0.1),
                ("valence", 0.3),
                ("tempo", 72.0),
            ]),
        );
        source.insert("partial", map(&[("acousticness", 0.9), ("tempo", 72.0)]));
        source
    }

    #[test]
    fn test_static_lookup() {
        let features = source().features_for("complete").unwrap();
        assert_eq!(features, FeatureVector::new(0.9, 0.1, 0.3, 72.0));
    }

    #[test]
    fn test_static_incomplete_entry_fails() {
        let err = source().features_for("partial").unwrap_err();
        assert!(matches!(err, EtlError::Extraction { .. }));
        assert!(err.to_string().contains("liveness"));
    }

    #[test]
    fn test_static_unknown_track_fails() {
        assert!(source().features_for("nope").is_err());
    }

    #[test]
    fn test_fallback_fills_failures() {
        let source = WithFallback::new(source());
        assert_eq!(
            source.resolve("complete"),
            FeatureVector::new(0.9, 0.1, 0.3, 72.0)
        );
        assert_eq!(source.resolve("partial"), FeatureVector::FALLBACK);
        assert_eq!(source.features_for("nope").unwrap(), FeatureVector::FALLBACK);
    }

    #[test]
    fn test_custom_fallback() {
        let custom = FeatureVector::new(0.0, 0.0, 0.0, 100.0);
        let source = WithFallback::with_fallback(StaticFeatureSource::new(), custom);
        assert_eq!(source.resolve("anything"), custom);
        assert!(source.inner().is_empty());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        std::fs::write(
            &path,
            r#"{"abc": {"acousticness": 0.2, "liveness": 0.3, "valence": 0.4, "tempo": 150}}"#,
        )
        .unwrap();

        let source = StaticFeatureSource::from_json_file(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(
            source.features_for("abc").unwrap(),
            FeatureVector::new(0.2, 0.3, 0.4, 150.0)
        );
    }
}
