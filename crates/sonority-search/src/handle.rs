//! The process-wide active model, published once at startup and swapped
//! atomically on rebuild.

use std::sync::{Arc, PoisonError, RwLock};

use sonority_core::{FeatureVector, Recommendation};

use crate::engine::Engine;
use crate::error::{SearchError, SearchResult};

/// Holds the currently active [`Engine`], if any.
///
/// Request handlers take a clone of the `Arc` and query it without holding
/// the lock, so a query never waits on another query and a rebuild can
/// swap in a new engine while older queries finish on the previous one.
#[derive(Debug, Default)]
pub struct ModelHandle {
    active: RwLock<Option<Arc<Engine>>>,
}

impl ModelHandle {
    /// An empty handle; queries fail with [`SearchError::NotReady`] until
    /// an engine is published.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            active: RwLock::new(Some(Arc::new(engine))),
        }
    }

    /// Make `engine` the active model, returning the one it replaced.
    pub fn publish(&self, engine: Engine) -> Option<Arc<Engine>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        log::info!("Publishing model with {} items", engine.stats().items);
        active.replace(Arc::new(engine))
    }

    /// The active engine.
    pub fn current(&self) -> SearchResult<Arc<Engine>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or(SearchError::NotReady)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Release the active engine. Later queries fail with `NotReady`.
    pub fn shutdown(&self) -> Option<Arc<Engine>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let previous = active.take();
        if previous.is_some() {
            log::info!("Model released");
        }
        previous
    }

    /// Run [`Engine::recommend`] on the active engine.
    pub fn recommend(
        &self,
        features: &FeatureVector,
        year: Option<u16>,
        n: usize,
    ) -> SearchResult<Vec<Recommendation>> {
        self.current()?.recommend(features, year, n)
    }
}
