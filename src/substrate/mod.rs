//! Substrate - Memory Orchestrator
//!
//! `TigerStyle`: Every operation is atomic across the tiers it touches.
//!
//! # Overview
//!
//! The substrate composes the three tiers:
//! - [`FastCache`] (L1) embeds, indexes and holds the hot working set
//! - [`PersistentStore`] (L2, optional) takes records L1 has no room for
//! - [`SemanticStore`] (L3) binds concept keys to record ids
//!
//! ```text
//! store:   validate ─► embed ─► make room (L1 victim ─► L2) ─► index ─► L1 ─► L3
//! search:  validate ─► embed ─► index top-k ─► resolve (L1, else L2) ─► rank ─► enrich (L3)
//! ```
//!
//! A store into a full cache without L2 fails with `CapacityExceeded`;
//! records are never dropped to make room.
//!
//! # Example
//!
//! ```rust
//! use strata_memory::{Metadata, SearchOptions, Substrate};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut substrate = Substrate::sim(42);
//!
//! let stored = substrate
//!     .store("Rust ownership rules", Metadata::new().with("topic", "rust"))
//!     .await
//!     .unwrap();
//! let results = substrate
//!     .search("Rust ownership rules", SearchOptions::new().with_k(3))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(results[0].id, stored.id);
//! # });
//! ```

mod builder;
mod config;
mod handle;

pub use builder::SubstrateBuilder;
pub use config::{ConfigError, PersistentConfig, SubstrateConfig};
pub use handle::SubstrateHandle;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{CONTENT_BYTES_MAX, QUERY_BYTES_MAX, SEARCH_RESULTS_COUNT_MAX};
use crate::dst::{Clock, SimClock};
use crate::embedding::SimEmbedder;
use crate::error::{MemoryError, MemoryResult};
use crate::index::{IndexStats, SimVectorIndex};
use crate::memory::{
    ms_to_datetime, ConceptRecord, FastCache, FastCacheStats, Metadata, PersistentStats,
    PersistentStore, RelationType, SemanticStore, VectorRecord,
};

// =============================================================================
// Options and Result Types
// =============================================================================

/// Result of a successful `store`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageResult {
    /// Id assigned by the index
    pub id: String,
    /// Embedding of the content
    pub vector: Vec<f32>,
    /// Content as stored
    pub content: String,
    /// Creation time of the record
    pub timestamp: DateTime<Utc>,
}

/// Options for `search`.
///
/// `TigerStyle`: Builder pattern with defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum results. `None` uses `SubstrateConfig::default_k`.
    pub k: Option<usize>,
}

impl SearchOptions {
    /// Options with every field unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of results.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }
}

/// One search result with its related concepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedResult {
    /// Record id
    pub id: String,
    /// Similarity score, higher is closer
    pub score: f32,
    /// Record content
    pub content: String,
    /// Record metadata
    pub metadata: Metadata,
    /// Record creation time (ms since epoch)
    pub created_at_ms: u64,
    /// Concepts similar to this record's content
    pub related_concepts: Vec<ConceptRecord>,
}

/// What a `consolidate` call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    /// Backend statistics pulled into L1
    pub backend: IndexStats,
    /// Ids moved from L1 to L2, least recently used first
    pub migrated: Vec<String>,
}

/// Point-in-time view of every tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Time of the last state change
    pub timestamp: DateTime<Utc>,
    /// L1 statistics
    pub fast_cache: FastCacheStats,
    /// Live concept keys in L3
    pub semantic_concept_count: usize,
    /// Entries in the L3 temporal log
    pub temporal_length: usize,
    /// L2 summary, when L2 is enabled
    pub persistent: Option<PersistentStats>,
}

/// Tier a record currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    /// Resident in the fast cache
    Fast,
    /// Only in the persistent store
    Persistent,
}

/// An L1 victim copied to L2 ahead of an insert.
#[derive(Debug)]
struct Spill {
    id: String,
    newly_written: bool,
}

// =============================================================================
// Substrate
// =============================================================================

/// Tiered memory: L1 fast cache, optional L2 persistent store, L3 concepts.
///
/// Mutating operations take `&mut self`. Use [`SubstrateHandle`] to share
/// one substrate between tasks.
#[derive(Debug)]
pub struct Substrate {
    config: SubstrateConfig,
    fast_cache: FastCache,
    semantic: SemanticStore,
    persistent: Option<Arc<dyn PersistentStore>>,
    /// Ids with a copy in L2, seeded from the store when built.
    persisted: BTreeSet<String>,
    clock: Arc<dyn Clock>,
    last_change_ms: u64,
}

impl Substrate {
    /// Start building a substrate.
    #[must_use]
    pub fn builder() -> SubstrateBuilder {
        SubstrateBuilder::new()
    }

    /// Fully simulated substrate with the default config and no L2.
    ///
    /// Same seed, same embeddings.
    #[must_use]
    pub fn sim(seed: u64) -> Self {
        let config = SubstrateConfig::default();
        let clock: Arc<dyn Clock> = Arc::new(SimClock::new());

        let fast_cache = FastCache::new(
            Arc::new(SimEmbedder::new(seed, config.dimensions)),
            Arc::new(SimVectorIndex::new(config.dimensions)),
            Arc::clone(&clock),
        )
        .with_capacity(config.capacity)
        .with_model(config.embedding_model.clone())
        .with_backend_timeout(config.backend_timeout);
        let semantic = SemanticStore::new(Arc::clone(&clock));

        Self::from_parts(config, fast_cache, semantic, None, BTreeSet::new(), clock)
    }

    /// Fully simulated substrate with a custom config.
    ///
    /// L2, when the config enables it, is built as for [`SubstrateBuilder`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the config is invalid.
    pub fn sim_with_config(seed: u64, config: SubstrateConfig) -> Result<Self, ConfigError> {
        let dimensions = config.dimensions;
        Self::builder()
            .with_config(config)
            .with_embedder(Arc::new(SimEmbedder::new(seed, dimensions)))
            .with_index(Arc::new(SimVectorIndex::new(dimensions)))
            .with_clock(Arc::new(SimClock::new()))
            .build()
    }

    pub(crate) fn from_parts(
        config: SubstrateConfig,
        fast_cache: FastCache,
        semantic: SemanticStore,
        persistent: Option<Arc<dyn PersistentStore>>,
        persisted: BTreeSet<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Precondition
        debug_assert!(persistent.is_some() || persisted.is_empty());

        let last_change_ms = clock.now_ms();
        Self {
            config,
            fast_cache,
            semantic,
            persistent,
            persisted,
            clock,
            last_change_ms,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Store content with metadata.
    ///
    /// On success the record is resident in L1 and its concept is bound in
    /// L3. When L1 is full, the least recently used record moves to L2.
    ///
    /// # Errors
    /// - `InvalidInput` for blank or oversized content or malformed metadata
    /// - `BackendUnavailable` / `EmbeddingFailed` from the embedder or index
    /// - `CapacityExceeded` if L1 is full and L2 is disabled or unwritable
    ///
    /// No tier changes on error.
    #[tracing::instrument(skip(self, content, metadata), fields(content_len = content.len()))]
    pub async fn store(&mut self, content: &str, metadata: Metadata) -> MemoryResult<StorageResult> {
        // Preconditions
        validate_text("content", content, CONTENT_BYTES_MAX)?;
        metadata.validate()?;

        let log_len_before = self.semantic.temporal_len();
        let vector = self.fast_cache.embed(content).await?;

        let spill = if self.fast_cache.is_full() {
            match self.make_room("store").await {
                Ok(spill) => Some(spill),
                Err(MemoryError::PersistentStore { message, .. }) => {
                    tracing::warn!(%message, "persistent store unwritable; store rejected");
                    return Err(MemoryError::CapacityExceeded {
                        capacity: self.fast_cache.capacity(),
                    });
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let replacing = spill.as_ref().map(|s| s.id.as_str());
        let record = match self
            .fast_cache
            .store(vector, content, metadata, replacing, &self.persisted)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                if let Some(spill) = &spill {
                    self.undo_spill(spill, "store").await;
                }
                return Err(e);
            }
        };
        if let Some(spill) = spill {
            self.commit_spill(spill);
        }

        let concept = self.semantic.add_concept(content, &record.id);
        self.mark_changed();
        tracing::debug!(id = %record.id, concept = %concept.key, "stored");

        // Postconditions
        debug_assert_eq!(self.semantic.temporal_len(), log_len_before + 1);
        debug_assert!(self.locate(&concept.vector_id).is_some());

        let timestamp = record.created_at();
        Ok(StorageResult {
            id: record.id,
            vector: record.vector,
            content: record.content,
            timestamp,
        })
    }

    /// Nearest records to `query`, each enriched with similar concepts.
    ///
    /// Hits that are no longer resident are read back from L2 and cached
    /// again when there is room (or a victim can be moved to L2). Hits
    /// missing from every tier are skipped.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank or oversized query or a bad `k`
    /// - `BackendUnavailable` / `EmbeddingFailed` from the embedder or index
    /// - `PersistentStore` if L2 cannot be read
    ///
    /// No tier, counter or timestamp changes on error.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn search(
        &mut self,
        query: &str,
        options: SearchOptions,
    ) -> MemoryResult<Vec<EnrichedResult>> {
        // Preconditions
        let k = options.k.unwrap_or(self.config.default_k);
        validate_text("query", query, QUERY_BYTES_MAX)?;
        if k == 0 || k > SEARCH_RESULTS_COUNT_MAX {
            return Err(MemoryError::invalid_input(format!(
                "k must be 1-{SEARCH_RESULTS_COUNT_MAX}: got {k}"
            )));
        }

        let query_vector = self.fast_cache.embed(query).await?;
        let hits = self.fast_cache.search(&query_vector, k).await?;

        // Every L2 read happens before anything changes.
        let mut resolved: Vec<(f32, VectorRecord)> = Vec::with_capacity(hits.len());
        let mut cold: Vec<VectorRecord> = Vec::new();
        for hit in &hits {
            let record = match &hit.record {
                Some(record) => record.clone(),
                None => match self.read_cold(&hit.id).await? {
                    Some(record) => {
                        cold.push(record.clone());
                        record
                    }
                    None => {
                        tracing::warn!(id = %hit.id, "search hit missing from every tier; skipped");
                        continue;
                    }
                },
            };
            resolved.push((hit.score, record));
        }

        // Commit. Resident hits are touched first so rehydration evicts
        // them last.
        self.fast_cache.record_access(&hits);
        for record in cold {
            self.persisted.insert(record.id.clone());
            self.rehydrate(record).await;
        }
        self.mark_changed();

        resolved.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        let results: Vec<EnrichedResult> = resolved
            .into_iter()
            .map(|(score, record)| self.enrich(score, record))
            .collect();

        // Postconditions
        debug_assert!(results.len() <= k);
        debug_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        Ok(results)
    }

    /// Refresh backend statistics and migrate idle records to L2.
    ///
    /// Migration runs only with L2 enabled and
    /// `idle_migration_after` set. All L2 writes happen before anything
    /// leaves L1; any failure removes the writes this call made.
    ///
    /// # Errors
    /// - `BackendUnavailable` if the index stats call fails
    /// - `PersistentStore` if a migration write fails
    ///
    /// No tier changes on error.
    #[tracing::instrument(skip(self))]
    pub async fn consolidate(&mut self) -> MemoryResult<ConsolidationReport> {
        let candidates = self.migration_candidates();
        let mut written: Vec<String> = Vec::new();

        if let Some(store) = self.persistent.clone() {
            for id in &candidates {
                if self.persisted.contains(id) {
                    continue;
                }
                let Some(record) = self.fast_cache.get(id) else {
                    continue;
                };
                if let Err(e) = store.put(record).await {
                    tracing::warn!(id = %id, error = %e, "consolidation write failed; rolling back");
                    self.remove_written(&written, "consolidate").await;
                    return Err(MemoryError::from_persistent("consolidate", &e));
                }
                written.push(id.clone());
            }
        }

        let backend = match self.fast_cache.update_stats().await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(error = %e, "consolidation stats refresh failed");
                self.remove_written(&written, "consolidate").await;
                return Err(e);
            }
        };

        // Commit
        self.persisted.extend(written);
        for id in &candidates {
            self.fast_cache.evict(id);
        }
        self.mark_changed();

        if !candidates.is_empty() {
            tracing::info!(migrated = candidates.len(), "idle records moved to persistent store");
        }

        Ok(ConsolidationReport {
            backend,
            migrated: candidates,
        })
    }

    /// Snapshot of every tier. Pure read.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            timestamp: ms_to_datetime(self.last_change_ms),
            fast_cache: self.fast_cache.stats(),
            semantic_concept_count: self.semantic.concept_count(),
            temporal_length: self.semantic.temporal_len(),
            persistent: self.persistent.as_ref().map(|store| PersistentStats {
                backend: store.name().to_string(),
                namespace: store.namespace().to_string(),
                record_count: self.persisted.len(),
            }),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Tier holding `id`, if any.
    #[must_use]
    pub fn locate(&self, id: &str) -> Option<Tier> {
        if self.fast_cache.contains(id) {
            Some(Tier::Fast)
        } else if self.persisted.contains(id) {
            Some(Tier::Persistent)
        } else {
            None
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SubstrateConfig {
        &self.config
    }

    /// L1.
    #[must_use]
    pub fn fast_cache(&self) -> &FastCache {
        &self.fast_cache
    }

    /// L3.
    #[must_use]
    pub fn semantic(&self) -> &SemanticStore {
        &self.semantic
    }

    /// L2, when enabled.
    #[must_use]
    pub fn persistent(&self) -> Option<&Arc<dyn PersistentStore>> {
        self.persistent.as_ref()
    }

    // =========================================================================
    // Tier Movement
    // =========================================================================

    /// Copy the L1 victim to L2 so an insert can replace it.
    async fn make_room(&self, operation: &'static str) -> MemoryResult<Spill> {
        let capacity = self.fast_cache.capacity();
        let Some(store) = &self.persistent else {
            return Err(MemoryError::CapacityExceeded { capacity });
        };
        let Some(victim) = self.fast_cache.select_victim() else {
            return Err(MemoryError::CapacityExceeded { capacity });
        };

        if self.persisted.contains(&victim.id) {
            return Ok(Spill {
                id: victim.id.clone(),
                newly_written: false,
            });
        }

        store
            .put(victim)
            .await
            .map_err(|e| MemoryError::from_persistent(operation, &e))?;
        tracing::debug!(id = %victim.id, operation, "victim copied to persistent store");

        Ok(Spill {
            id: victim.id.clone(),
            newly_written: true,
        })
    }

    fn commit_spill(&mut self, spill: Spill) {
        if spill.newly_written {
            self.persisted.insert(spill.id);
        }
    }

    async fn undo_spill(&self, spill: &Spill, operation: &'static str) {
        if spill.newly_written {
            self.remove_written(std::slice::from_ref(&spill.id), operation)
                .await;
        }
    }

    async fn remove_written(&self, ids: &[String], operation: &'static str) {
        let Some(store) = &self.persistent else {
            return;
        };
        for id in ids {
            match store.remove(id).await {
                Ok(_) => tracing::warn!(id = %id, operation, "persistent write rolled back"),
                Err(e) => tracing::warn!(
                    id = %id,
                    operation,
                    error = %e,
                    "rollback failed; extra copy left in persistent store"
                ),
            }
        }
    }

    /// Read a non-resident hit from L2.
    async fn read_cold(&self, id: &str) -> MemoryResult<Option<VectorRecord>> {
        let Some(store) = &self.persistent else {
            return Ok(None);
        };
        store
            .get(id)
            .await
            .map_err(|e| MemoryError::from_persistent("search", &e))
    }

    /// Cache an L2 record again, moving a victim to L2 if needed.
    ///
    /// Best effort: without room the record is served uncached.
    async fn rehydrate(&mut self, record: VectorRecord) {
        if !self.fast_cache.is_full() {
            if let Err(e) = self.fast_cache.rehydrate(record, None) {
                tracing::warn!(error = %e, "rehydration failed");
            }
            return;
        }

        match self.make_room("search").await {
            Ok(spill) => match self.fast_cache.rehydrate(record, Some(&spill.id)) {
                Ok(()) => self.commit_spill(spill),
                Err(e) => {
                    tracing::warn!(error = %e, "rehydration failed");
                    self.undo_spill(&spill, "search").await;
                }
            },
            Err(e) => tracing::warn!(
                id = %record.id,
                error = %e,
                "no room to rehydrate; served from persistent store"
            ),
        }
    }

    fn migration_candidates(&self) -> Vec<String> {
        match (&self.persistent, self.config.idle_migration_after) {
            (Some(_), Some(idle)) => {
                let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
                self.fast_cache.idle_ids(idle_ms)
            }
            _ => Vec::new(),
        }
    }

    fn enrich(&self, score: f32, record: VectorRecord) -> EnrichedResult {
        let mut related = self
            .semantic
            .find_related(&record.content, RelationType::Similar);
        related.truncate(self.config.related_limit);

        EnrichedResult {
            id: record.id,
            score,
            content: record.content,
            metadata: record.metadata,
            created_at_ms: record.created_at_ms,
            related_concepts: related,
        }
    }

    fn mark_changed(&mut self) {
        self.last_change_ms = self.clock.now_ms();
    }
}

fn validate_text(field: &str, text: &str, max_bytes: usize) -> MemoryResult<()> {
    if text.trim().is_empty() {
        return Err(MemoryError::invalid_input(format!("{field} is empty")));
    }
    if text.len() > max_bytes {
        return Err(MemoryError::invalid_input(format!(
            "{field} too long: {} bytes (max {max_bytes})",
            text.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::dst::{DeterministicRng, FaultConfig, FaultInjectorBuilder, FaultType};
    use crate::index::{IndexError, IndexHit, VectorIndex};
    use crate::memory::SimPersistentStore;

    const DIM: usize = 4;

    /// Index whose stores can be switched to fail mid-test.
    #[derive(Debug, Clone)]
    struct SwitchableIndex {
        inner: SimVectorIndex,
        fail_stores: Arc<AtomicBool>,
    }

    impl SwitchableIndex {
        fn new() -> Self {
            Self {
                inner: SimVectorIndex::new(DIM),
                fail_stores: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for SwitchableIndex {
        async fn store_vector(&self, vector: &[f32], payload: &Metadata) -> Result<String, IndexError> {
            if self.fail_stores.load(Ordering::SeqCst) {
                return Err(IndexError::StoreFailed {
                    message: "switched off".into(),
                });
            }
            self.inner.store_vector(vector, payload).await
        }

        async fn search_vectors(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
            self.inner.search_vectors(query, k).await
        }

        async fn memory_stats(&self) -> Result<IndexStats, IndexError> {
            self.inner.memory_stats().await
        }

        fn name(&self) -> &'static str {
            "switchable"
        }
    }

    fn config(capacity: usize) -> SubstrateConfig {
        SubstrateConfig::default()
            .with_dimensions(DIM)
            .with_capacity(capacity)
    }

    fn substrate(capacity: usize, store: Option<SimPersistentStore>) -> (Substrate, SimClock) {
        let clock = SimClock::at_ms(1_000);
        let mut builder = Substrate::builder()
            .with_config(config(capacity))
            .with_embedder(Arc::new(SimEmbedder::new(42, DIM)))
            .with_index(Arc::new(SimVectorIndex::new(DIM)))
            .with_clock(Arc::new(clock.clone()));
        if let Some(store) = store {
            builder = builder.with_persistent_store(Arc::new(store));
        }
        (builder.build().unwrap(), clock)
    }

    // =========================================================================
    // store
    // =========================================================================

    #[tokio::test]
    async fn test_store_binds_concept_and_caches() {
        let (mut substrate, _) = substrate(4, None);

        let stored = substrate
            .store("  Coffee Beans ", Metadata::new().with("origin", "kenya"))
            .await
            .unwrap();

        assert_eq!(stored.vector.len(), DIM);
        assert_eq!(stored.content, "  Coffee Beans ");
        assert_eq!(stored.timestamp.timestamp_millis(), 1_000);
        assert_eq!(substrate.locate(&stored.id), Some(Tier::Fast));
        assert_eq!(
            substrate.semantic().get("coffee beans").unwrap().vector_id,
            stored.id
        );
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_input_before_backends() {
        let (mut substrate, _) = substrate(4, None);

        let blank = substrate.store(" \n", Metadata::new()).await;
        let huge = substrate
            .store(&"x".repeat(CONTENT_BYTES_MAX + 1), Metadata::new())
            .await;
        let bad_meta = substrate
            .store("ok", Metadata::new().with("", "empty key"))
            .await;

        assert!(matches!(blank, Err(MemoryError::InvalidInput { .. })));
        assert!(matches!(huge, Err(MemoryError::InvalidInput { .. })));
        assert!(matches!(bad_meta, Err(MemoryError::InvalidInput { .. })));
        assert_eq!(substrate.stats().fast_cache.write_count, 0);
        assert_eq!(substrate.stats().temporal_length, 0);
    }

    #[tokio::test]
    async fn test_full_cache_without_l2_is_capacity_exceeded() {
        let (mut substrate, _) = substrate(2, None);
        substrate.store("a", Metadata::new()).await.unwrap();
        substrate.store("b", Metadata::new()).await.unwrap();

        let err = substrate.store("c", Metadata::new()).await.unwrap_err();

        assert_eq!(err, MemoryError::CapacityExceeded { capacity: 2 });
        assert_eq!(substrate.fast_cache().len(), 2);
        assert_eq!(substrate.semantic().concept_count(), 2);
    }

    #[tokio::test]
    async fn test_full_cache_spills_lru_to_l2() {
        let l2 = SimPersistentStore::new();
        let (mut substrate, _) = substrate(2, Some(l2.clone()));
        let a = substrate.store("a", Metadata::new()).await.unwrap();
        let b = substrate.store("b", Metadata::new()).await.unwrap();

        let c = substrate.store("c", Metadata::new()).await.unwrap();

        assert_eq!(substrate.locate(&a.id), Some(Tier::Persistent));
        assert_eq!(substrate.locate(&b.id), Some(Tier::Fast));
        assert_eq!(substrate.locate(&c.id), Some(Tier::Fast));
        assert_eq!(l2.ids(), vec![a.id.clone()]);
        assert_eq!(substrate.stats().fast_cache.evictions, 1);
        assert_eq!(substrate.stats().persistent.unwrap().record_count, 1);
    }

    #[tokio::test]
    async fn test_unwritable_l2_is_capacity_exceeded() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(1))
                .with_fault(FaultConfig::new(FaultType::ColdStoreWriteFail, 1.0))
                .build(),
        );
        let l2 = SimPersistentStore::new().with_faults(faults);
        let (mut substrate, _) = substrate(1, Some(l2.clone()));
        let a = substrate.store("a", Metadata::new()).await.unwrap();

        let err = substrate.store("b", Metadata::new()).await.unwrap_err();

        assert_eq!(err, MemoryError::CapacityExceeded { capacity: 1 });
        assert_eq!(substrate.locate(&a.id), Some(Tier::Fast));
        assert!(l2.ids().is_empty());
    }

    #[tokio::test]
    async fn test_failed_index_store_rolls_back_spill() {
        let index = SwitchableIndex::new();
        let l2 = SimPersistentStore::new();
        let mut substrate = Substrate::builder()
            .with_config(config(1))
            .with_embedder(Arc::new(SimEmbedder::new(42, DIM)))
            .with_index(Arc::new(index.clone()))
            .with_persistent_store(Arc::new(l2.clone()))
            .with_clock(Arc::new(SimClock::new()))
            .build()
            .unwrap();
        let a = substrate.store("a", Metadata::new()).await.unwrap();
        let before = substrate.stats();

        index.fail_stores.store(true, Ordering::SeqCst);
        let err = substrate.store("b", Metadata::new()).await.unwrap_err();

        assert!(matches!(
            err,
            MemoryError::BackendUnavailable {
                operation: "store",
                ..
            }
        ));
        assert!(!err.is_retryable());
        assert_eq!(substrate.locate(&a.id), Some(Tier::Fast));
        assert!(l2.ids().is_empty());
        assert_eq!(substrate.stats(), before);
    }

    #[tokio::test]
    async fn test_index_reusing_an_l2_id_is_rejected() {
        let l2 = SimPersistentStore::new();
        let earlier = VectorRecord {
            id: "vec-1".to_string(),
            vector: vec![0.5; DIM],
            content: "from an earlier run".to_string(),
            created_at_ms: 1,
            metadata: Metadata::new(),
            sequence: 1,
        };
        l2.put(&earlier).await.unwrap();
        let (mut substrate, _) = substrate(2, Some(l2.clone()));
        assert_eq!(substrate.locate("vec-1"), Some(Tier::Persistent));
        let before = substrate.stats();

        // A fresh sim index starts again at vec-1.
        let err = substrate.store("new", Metadata::new()).await.unwrap_err();

        assert!(matches!(
            err,
            MemoryError::BackendUnavailable {
                operation: "store",
                ..
            }
        ));
        assert_eq!(substrate.stats(), before);
        assert_eq!(l2.get("vec-1").await.unwrap(), Some(earlier));

        let next = substrate.store("new", Metadata::new()).await.unwrap();
        assert_eq!(next.id, "vec-2");
    }

    #[tokio::test]
    async fn test_embedder_outage_leaves_tiers_untouched() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(7))
                .with_fault(FaultConfig::new(FaultType::EmbeddingServiceUnavailable, 1.0))
                .build(),
        );
        let mut substrate = Substrate::builder()
            .with_config(config(4))
            .with_embedder(Arc::new(SimEmbedder::new(1, DIM).with_faults(faults)))
            .with_index(Arc::new(SimVectorIndex::new(DIM)))
            .build()
            .unwrap();
        let before = substrate.stats();

        let err = substrate.store("a", Metadata::new()).await.unwrap_err();

        assert!(matches!(err, MemoryError::BackendUnavailable { .. }));
        assert_eq!(substrate.stats(), before);
    }

    // =========================================================================
    // search
    // =========================================================================

    #[tokio::test]
    async fn test_search_exact_content_ranks_first() {
        let (mut substrate, _) = substrate(8, None);
        substrate.store("apples", Metadata::new()).await.unwrap();
        let target = substrate.store("bananas", Metadata::new()).await.unwrap();
        substrate.store("cherries", Metadata::new()).await.unwrap();

        let results = substrate
            .search("bananas", SearchOptions::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, target.id);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_respects_k_and_default() {
        let (mut substrate, _) = substrate(16, None);
        for i in 0..8 {
            substrate
                .store(&format!("note {i}"), Metadata::new())
                .await
                .unwrap();
        }

        let default_k = substrate.search("note", SearchOptions::new()).await.unwrap();
        let two = substrate
            .search("note", SearchOptions::new().with_k(2))
            .await
            .unwrap();

        assert_eq!(default_k.len(), 5);
        assert_eq!(two.len(), 2);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_k_and_query() {
        let (mut substrate, _) = substrate(4, None);

        for k in [0, SEARCH_RESULTS_COUNT_MAX + 1] {
            let result = substrate.search("q", SearchOptions::new().with_k(k)).await;
            assert!(matches!(result, Err(MemoryError::InvalidInput { .. })));
        }
        let blank = substrate.search("  ", SearchOptions::new()).await;
        assert!(matches!(blank, Err(MemoryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_search_empty_substrate() {
        let (mut substrate, _) = substrate(4, None);
        let results = substrate
            .search("anything", SearchOptions::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_enriches_with_similar_concepts() {
        let (mut substrate, _) = substrate(8, None);
        substrate.store("coffee", Metadata::new()).await.unwrap();
        substrate
            .store("iced coffee recipe", Metadata::new())
            .await
            .unwrap();
        substrate.store("tea", Metadata::new()).await.unwrap();

        let results = substrate
            .search("coffee", SearchOptions::new().with_k(3))
            .await
            .unwrap();
        let coffee = results.iter().find(|r| r.content == "coffee").unwrap();

        let keys: Vec<&str> = coffee
            .related_concepts
            .iter()
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(keys, vec!["coffee", "iced coffee recipe"]);
    }

    #[tokio::test]
    async fn test_related_limit_caps_enrichment() {
        let mut substrate = Substrate::sim_with_config(
            3,
            config(8).with_related_limit(1),
        )
        .unwrap();
        substrate.store("coffee", Metadata::new()).await.unwrap();
        substrate.store("coffee beans", Metadata::new()).await.unwrap();

        let results = substrate
            .search("coffee", SearchOptions::new().with_k(1))
            .await
            .unwrap();

        assert_eq!(results[0].related_concepts.len(), 1);
    }

    #[tokio::test]
    async fn test_search_rehydrates_from_l2() {
        let (mut substrate, _) = substrate(2, Some(SimPersistentStore::new()));
        let a = substrate.store("alpha", Metadata::new()).await.unwrap();
        substrate.store("beta", Metadata::new()).await.unwrap();
        substrate.store("gamma", Metadata::new()).await.unwrap();
        assert_eq!(substrate.locate(&a.id), Some(Tier::Persistent));

        let results = substrate
            .search("alpha", SearchOptions::new().with_k(1))
            .await
            .unwrap();

        assert_eq!(results[0].id, a.id);
        assert_eq!(results[0].content, "alpha");
        assert_eq!(substrate.locate(&a.id), Some(Tier::Fast));
        assert_eq!(substrate.fast_cache().len(), 2);
        assert_eq!(substrate.stats().fast_cache.rehydrations, 1);
    }

    #[tokio::test]
    async fn test_l2_read_failure_fails_search() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(5))
                .with_fault(FaultConfig::new(FaultType::ColdStoreReadFail, 1.0))
                .build(),
        );
        let (mut substrate, clock) =
            substrate(2, Some(SimPersistentStore::new().with_faults(faults)));
        let alpha = substrate.store("alpha", Metadata::new()).await.unwrap();
        let beta = substrate.store("beta", Metadata::new()).await.unwrap();
        let gamma = substrate.store("gamma", Metadata::new()).await.unwrap();
        assert_eq!(substrate.locate(&alpha.id), Some(Tier::Persistent));
        assert_eq!(substrate.fast_cache().select_victim().unwrap().id, beta.id);
        let before = substrate.stats();

        clock.advance_ms(500);
        let err = substrate
            .search("alpha", SearchOptions::new().with_k(3))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MemoryError::PersistentStore {
                operation: "search",
                ..
            }
        ));
        assert!(err.is_retryable());
        // A failed search leaves counters, recency and residency alone.
        assert_eq!(substrate.stats(), before);
        assert_eq!(substrate.fast_cache().select_victim().unwrap().id, beta.id);
        assert_eq!(substrate.locate(&alpha.id), Some(Tier::Persistent));
        assert_eq!(substrate.locate(&gamma.id), Some(Tier::Fast));
    }

    // =========================================================================
    // consolidate
    // =========================================================================

    #[tokio::test]
    async fn test_consolidate_refreshes_backend_stats() {
        let (mut substrate, _) = substrate(4, None);
        substrate.store("a", Metadata::new()).await.unwrap();

        let report = substrate.consolidate().await.unwrap();

        assert_eq!(report.backend.vector_count, 1);
        assert!(report.migrated.is_empty());
        assert_eq!(substrate.stats().fast_cache.backend, Some(report.backend));
    }

    #[tokio::test]
    async fn test_consolidate_migrates_idle_records() {
        let clock = SimClock::at_ms(0);
        let l2 = SimPersistentStore::new();
        let mut substrate = Substrate::builder()
            .with_config(config(4).with_idle_migration(Duration::from_secs(30)))
            .with_embedder(Arc::new(SimEmbedder::new(42, DIM)))
            .with_index(Arc::new(SimVectorIndex::new(DIM)))
            .with_persistent_store(Arc::new(l2.clone()))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        let a = substrate.store("a", Metadata::new()).await.unwrap();
        let b = substrate.store("b", Metadata::new()).await.unwrap();

        clock.advance_ms(60_000);
        substrate
            .search("b", SearchOptions::new().with_k(1))
            .await
            .unwrap();
        let report = substrate.consolidate().await.unwrap();

        assert_eq!(report.migrated, vec![a.id.clone()]);
        assert_eq!(substrate.locate(&a.id), Some(Tier::Persistent));
        assert_eq!(substrate.locate(&b.id), Some(Tier::Fast));
        assert_eq!(l2.ids(), vec![a.id]);
    }

    #[tokio::test]
    async fn test_consolidate_failure_rolls_back_migration() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(9))
                .with_fault(FaultConfig::new(FaultType::IndexStatsFail, 1.0))
                .build(),
        );
        let l2 = SimPersistentStore::new();
        let mut substrate = Substrate::builder()
            .with_config(config(4).with_idle_migration(Duration::ZERO))
            .with_embedder(Arc::new(SimEmbedder::new(42, DIM)))
            .with_index(Arc::new(SimVectorIndex::new(DIM).with_faults(faults)))
            .with_persistent_store(Arc::new(l2.clone()))
            .with_clock(Arc::new(SimClock::new()))
            .build()
            .unwrap();
        substrate.store("a", Metadata::new()).await.unwrap();
        substrate.store("b", Metadata::new()).await.unwrap();
        let before = substrate.stats();

        let err = substrate.consolidate().await.unwrap_err();

        assert!(matches!(
            err,
            MemoryError::BackendUnavailable {
                operation: "consolidate",
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(l2.ids().is_empty());
        assert_eq!(substrate.stats(), before);
    }

    #[tokio::test]
    async fn test_consolidate_is_repeatable() {
        let (mut substrate, _) = substrate(4, None);
        substrate.store("a", Metadata::new()).await.unwrap();

        let first = substrate.consolidate().await.unwrap();
        let second = substrate.consolidate().await.unwrap();

        assert_eq!(first.backend.vector_count, second.backend.vector_count);
        assert_eq!(substrate.semantic().temporal_len(), 1);
    }

    // =========================================================================
    // stats
    // =========================================================================

    #[tokio::test]
    async fn test_stats_is_pure() {
        let (mut substrate, clock) = substrate(4, None);
        substrate.store("a", Metadata::new()).await.unwrap();

        let first = substrate.stats();
        clock.advance_ms(5_000);
        let second = substrate.stats();

        assert_eq!(first, second);
        assert_eq!(first.semantic_concept_count, 1);
        assert_eq!(first.temporal_length, 1);
        assert!(first.persistent.is_none());
    }

    #[tokio::test]
    async fn test_stats_timestamp_tracks_last_change() {
        let (mut substrate, clock) = substrate(4, None);
        assert_eq!(substrate.stats().timestamp.timestamp_millis(), 1_000);

        clock.advance_ms(250);
        substrate.store("a", Metadata::new()).await.unwrap();

        assert_eq!(substrate.stats().timestamp.timestamp_millis(), 1_250);
    }

    #[test]
    fn test_sim_constructor_defaults() {
        let substrate = Substrate::sim(42);

        assert_eq!(substrate.config(), &SubstrateConfig::default());
        assert!(substrate.persistent().is_none());
        assert!(substrate.fast_cache().is_empty());
    }
}
