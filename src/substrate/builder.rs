//! Substrate Builder
//!
//! `TigerStyle`: Clean API, sensible defaults, fail fast.
//!
//! Assembles a [`Substrate`] from explicit components. The embedder and the
//! vector index are required; the clock defaults to the system clock and L2
//! follows [`SubstrateConfig::persistent`] unless a store is supplied.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::config::{ConfigError, SubstrateConfig};
use super::Substrate;
use crate::dst::{Clock, SystemClock};
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::memory::{
    FastCache, FilePersistentStore, PersistentStore, RelationFinder, SemanticStore,
    SimPersistentStore,
};

// =============================================================================
// SubstrateBuilder
// =============================================================================

/// Builder for [`Substrate`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_memory::{SimEmbedder, SimVectorIndex, Substrate, SubstrateConfig};
///
/// let substrate = Substrate::builder()
///     .with_config(SubstrateConfig::default().with_dimensions(8).with_capacity(16))
///     .with_embedder(Arc::new(SimEmbedder::new(42, 8)))
///     .with_index(Arc::new(SimVectorIndex::new(8)))
///     .build()
///     .unwrap();
/// assert_eq!(substrate.fast_cache().capacity(), 16);
/// ```
#[derive(Debug, Default)]
pub struct SubstrateBuilder {
    config: SubstrateConfig,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    persistent: Option<Arc<dyn PersistentStore>>,
    finder: Option<Box<dyn RelationFinder>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SubstrateBuilder {
    /// Create a builder with the default config and no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SubstrateConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index.
    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Use this L2 store, enabling L2 regardless of the config.
    #[must_use]
    pub fn with_persistent_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Use a custom relation finder in L3.
    #[must_use]
    pub fn with_relation_finder(mut self, finder: Box<dyn RelationFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Use this clock for timestamps and idle tracking.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the substrate.
    ///
    /// # Errors
    /// - `Invalid` if the config fails validation
    /// - `MissingComponent` if the embedder or index is not set
    /// - `DimensionMismatch` if the embedder disagrees with the config
    /// - `Persistent` if L2 cannot be opened or listed
    ///
    /// Records already in L2 count as persisted from the start, so a
    /// substrate reopened on an existing namespace sees them.
    pub fn build(self) -> Result<Substrate, ConfigError> {
        let config = self.config;
        config.validate()?;

        let embedder = self.embedder.ok_or(ConfigError::MissingComponent {
            component: "embedder",
        })?;
        let index = self.index.ok_or(ConfigError::MissingComponent {
            component: "index",
        })?;
        if embedder.dimensions() != config.dimensions {
            return Err(ConfigError::DimensionMismatch {
                config: config.dimensions,
                embedder: embedder.dimensions(),
            });
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let persistent = match (self.persistent, &config.persistent) {
            (Some(store), _) => Some(store),
            (None, Some(persistent)) => Some(match &persistent.root {
                Some(root) => Arc::new(FilePersistentStore::new(root, persistent.namespace.clone())?)
                    as Arc<dyn PersistentStore>,
                None => Arc::new(SimPersistentStore::with_namespace(persistent.namespace.clone())),
            }),
            (None, None) => None,
        };
        let persisted: BTreeSet<String> = match &persistent {
            Some(store) => store.stored_ids()?.into_iter().collect(),
            None => BTreeSet::new(),
        };

        let fast_cache = FastCache::new(embedder, index, Arc::clone(&clock))
            .with_capacity(config.capacity)
            .with_model(config.embedding_model.clone())
            .with_backend_timeout(config.backend_timeout);

        let semantic = match self.finder {
            Some(finder) => SemanticStore::with_finder(Arc::clone(&clock), finder),
            None => SemanticStore::new(Arc::clone(&clock)),
        };

        tracing::debug!(
            capacity = config.capacity,
            dimensions = config.dimensions,
            persistent = persistent.as_ref().map(|s| s.name()),
            persisted = persisted.len(),
            "substrate assembled"
        );

        Ok(Substrate::from_parts(
            config, fast_cache, semantic, persistent, persisted, clock,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
