use chrono::{DateTime, Utc};
use std::path::Path;

use crate::ann::AnnIndex;
use crate::error::{BuildError, LoadError};
use crate::metadata::Metadata;
use crate::persistence;
use crate::scaler::ScalerState;

/// The three parts produced together by one build: index, scaler state and
/// metadata. They are only valid as a set.
#[derive(Debug, Clone)]
pub struct Model {
    index: AnnIndex,
    scaler: ScalerState,
    metadata: Metadata,
    built_at: DateTime<Utc>,
}

impl Model {
    #[must_use]
    pub fn new(
        index: AnnIndex,
        scaler: ScalerState,
        metadata: Metadata,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            scaler,
            metadata,
            built_at,
        }
    }

    #[must_use]
    pub const fn index(&self) -> &AnnIndex {
        &self.index
    }

    #[must_use]
    pub const fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub const fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Write all artifacts to `dir`, replacing any model already there.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), BuildError> {
        persistence::save(self, dir.as_ref())
    }

    /// Read a model written by [`Model::save`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        persistence::load(dir.as_ref())
    }

    #[cfg(test)]
    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
