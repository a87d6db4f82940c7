//! Fast Cache (L1) - Hot Working Set
//!
//! `TigerStyle`: Bounded capacity, explicit eviction, every backend call
//! under a timeout.
//!
//! The fast cache fronts the embedding and index services. It never grows
//! past its capacity: inserting into a full cache requires naming the
//! resident record to replace, which the caller has already moved to L2.
//!
//! # Eviction
//!
//! Least-recently-accessed, tracked with a logical tick that advances on
//! every insert and every resident hit of a recorded search. Ties cannot occur (ticks are
//! unique), so victim selection is deterministic.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::record::{Metadata, VectorRecord};
use crate::constants::{
    BACKEND_TIMEOUT_MS_DEFAULT, EMBEDDING_MODEL_DEFAULT, FAST_CACHE_RECORDS_COUNT_DEFAULT,
    FAST_CACHE_RECORDS_COUNT_MAX, SEARCH_RESULTS_COUNT_MAX,
};
use crate::dst::Clock;
use crate::embedding::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::index::{IndexStats, VectorIndex};

// =============================================================================
// Types
// =============================================================================

/// One search hit from the fast cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Record id
    pub id: String,
    /// Similarity score from the index
    pub score: f32,
    /// Metadata the index holds for the id
    pub payload: Metadata,
    /// The record, when resident. `None` means the caller must rehydrate.
    pub record: Option<VectorRecord>,
}

impl CacheHit {
    fn tie_break(&self) -> u64 {
        self.record.as_ref().map_or(u64::MAX, |r| r.sequence)
    }
}

/// Fast cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastCacheStats {
    /// Records currently resident
    pub resident_count: usize,
    /// Maximum resident records
    pub capacity: usize,
    /// Vector dimension
    pub dimensions: usize,
    /// Embedding model name
    pub model: String,
    /// Successful stores
    pub write_count: u64,
    /// Successful searches
    pub query_count: u64,
    /// Records evicted to L2
    pub evictions: u64,
    /// Records brought back from L2
    pub rehydrations: u64,
    /// Time of the last successful store
    pub last_write_ms: Option<u64>,
    /// Last backend snapshot pulled by `update_stats`
    pub backend: Option<IndexStats>,
    /// When that snapshot was pulled
    pub backend_refreshed_ms: Option<u64>,
}

#[derive(Debug)]
struct CacheEntry {
    record: VectorRecord,
    last_access_tick: u64,
    last_access_ms: u64,
}

// =============================================================================
// FastCache
// =============================================================================

/// L1: bounded map of resident records in front of the embedding and index services.
#[derive(Debug)]
pub struct FastCache {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    clock: Arc<dyn Clock>,
    model: String,
    dimensions: usize,
    capacity: usize,
    backend_timeout: Duration,

    entries: HashMap<String, CacheEntry>,
    tick: u64,
    next_sequence: u64,

    write_count: u64,
    query_count: u64,
    evictions: u64,
    rehydrations: u64,
    last_write_ms: Option<u64>,
    backend_stats: Option<IndexStats>,
    backend_refreshed_ms: Option<u64>,
}

impl FastCache {
    /// Create an empty cache.
    ///
    /// Dimension is taken from the embedder; capacity, model and timeout
    /// start at their defaults.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, clock: Arc<dyn Clock>) -> Self {
        let dimensions = embedder.dimensions();
        Self {
            embedder,
            index,
            clock,
            model: EMBEDDING_MODEL_DEFAULT.to_string(),
            dimensions,
            capacity: FAST_CACHE_RECORDS_COUNT_DEFAULT,
            backend_timeout: Duration::from_millis(BACKEND_TIMEOUT_MS_DEFAULT),
            entries: HashMap::new(),
            tick: 0,
            next_sequence: 0,
            write_count: 0,
            query_count: 0,
            evictions: 0,
            rehydrations: 0,
            last_write_ms: None,
            backend_stats: None,
            backend_refreshed_ms: None,
        }
    }

    /// Set capacity.
    ///
    /// # Panics
    /// Panics if capacity is zero or above `FAST_CACHE_RECORDS_COUNT_MAX`.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        assert!(
            capacity <= FAST_CACHE_RECORDS_COUNT_MAX,
            "capacity {capacity} exceeds max {FAST_CACHE_RECORDS_COUNT_MAX}"
        );
        self.capacity = capacity;
        self
    }

    /// Set the embedding model name passed to the embedder.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the timeout applied to every embedder and index call.
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    // =========================================================================
    // Backend Operations
    // =========================================================================

    /// Embed content.
    ///
    /// # Errors
    /// - `InvalidInput` if the content is blank
    /// - `BackendUnavailable` if the embedder is unreachable or times out
    /// - `EmbeddingFailed` if the embedder returns an unusable vector
    #[tracing::instrument(skip(self, content), fields(content_len = content.len(), model = %self.model))]
    pub async fn embed(&self, content: &str) -> MemoryResult<Vec<f32>> {
        let text = content.trim();
        if text.is_empty() {
            return Err(MemoryError::invalid_input("content is empty"));
        }

        let vector = self
            .call_backend("embed", self.embedder.embed(text, &self.model))
            .await?
            .map_err(|e| MemoryError::from_embedding("embed", &e))?;

        if vector.len() != self.dimensions {
            return Err(MemoryError::embedding_failed(
                "embed",
                format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    vector.len()
                ),
            ));
        }

        Ok(vector)
    }

    /// Persist a vector through the index and cache the resulting record.
    ///
    /// When the cache is full, `replacing` must name a resident record; it
    /// is dropped from L1 only after the index accepted the new vector.
    /// `persisted` holds the ids L2 already has; the index must not hand out
    /// one of those or a resident id.
    ///
    /// # Errors
    /// - `CapacityExceeded` if the cache is full and nothing is being replaced
    /// - `NotFound` if `replacing` is not resident
    /// - `InvalidInput` if the vector has the wrong dimension
    /// - `BackendUnavailable` if the index fails, times out or reuses an id
    #[tracing::instrument(skip(self, vector, content, metadata, persisted))]
    pub async fn store(
        &mut self,
        vector: Vec<f32>,
        content: &str,
        metadata: Metadata,
        replacing: Option<&str>,
        persisted: &BTreeSet<String>,
    ) -> MemoryResult<VectorRecord> {
        if vector.len() != self.dimensions {
            return Err(MemoryError::invalid_input(format!(
                "vector has {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.check_room(replacing)?;

        let id = self
            .call_backend("store", self.index.store_vector(&vector, &metadata))
            .await?
            .map_err(|e| MemoryError::from_index("store", &e))?;

        if self.entries.contains_key(&id) || persisted.contains(&id) {
            tracing::warn!(id = %id, "index reused a live id");
            return Err(MemoryError::backend_unavailable(
                "store",
                format!("index returned duplicate id {id}"),
            ));
        }

        if let Some(victim) = replacing {
            self.evict(victim);
        }

        let now = self.clock.now_ms();
        self.next_sequence += 1;
        let record = VectorRecord {
            id,
            vector,
            content: content.to_string(),
            created_at_ms: now,
            metadata,
            sequence: self.next_sequence,
        };
        self.insert_entry(record.clone(), now);
        self.write_count += 1;
        self.last_write_ms = Some(now);

        // Postcondition
        assert!(
            self.entries.len() <= self.capacity,
            "resident count {} exceeds capacity {}",
            self.entries.len(),
            self.capacity
        );

        Ok(record)
    }

    /// Nearest-neighbor search.
    ///
    /// Returns at most `k` hits, by descending score with ties going to the
    /// earlier insert. Leaves the cache unchanged; pass the hits to
    /// [`record_access`](Self::record_access) once the caller commits.
    ///
    /// # Errors
    /// - `InvalidInput` if `k` is zero or above `SEARCH_RESULTS_COUNT_MAX`
    /// - `BackendUnavailable` if the index fails or times out
    #[tracing::instrument(skip(self, query))]
    pub async fn search(&self, query: &[f32], k: usize) -> MemoryResult<Vec<CacheHit>> {
        if k == 0 {
            return Err(MemoryError::invalid_input("k must be positive"));
        }
        if k > SEARCH_RESULTS_COUNT_MAX {
            return Err(MemoryError::invalid_input(format!(
                "k {k} exceeds max {SEARCH_RESULTS_COUNT_MAX}"
            )));
        }
        if query.len() != self.dimensions {
            return Err(MemoryError::invalid_input(format!(
                "query has {} dimensions, expected {}",
                query.len(),
                self.dimensions
            )));
        }

        let hits = self
            .call_backend("search", self.index.search_vectors(query, k))
            .await?
            .map_err(|e| MemoryError::from_index("search", &e))?;

        let mut results: Vec<CacheHit> = hits
            .into_iter()
            .take(k)
            .map(|hit| CacheHit {
                record: self.get(&hit.id).cloned(),
                id: hit.id,
                score: hit.score,
                payload: hit.payload,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.tie_break().cmp(&b.tie_break()))
        });

        // Postcondition
        debug_assert!(results.len() <= k);
        Ok(results)
    }

    /// Count a completed search and refresh the recency of its resident hits.
    pub fn record_access(&mut self, hits: &[CacheHit]) {
        let now = self.clock.now_ms();
        for hit in hits {
            self.touch(&hit.id, now);
        }
        self.query_count += 1;
    }

    /// Pull backend statistics and keep the snapshot.
    ///
    /// # Errors
    /// `BackendUnavailable` if the index fails or times out. The previous
    /// snapshot is kept.
    #[tracing::instrument(skip(self))]
    pub async fn update_stats(&mut self) -> MemoryResult<IndexStats> {
        let snapshot = self
            .call_backend("consolidate", self.index.memory_stats())
            .await?
            .map_err(|e| MemoryError::from_index("consolidate", &e))?;

        self.backend_stats = Some(snapshot.clone());
        self.backend_refreshed_ms = Some(self.clock.now_ms());
        Ok(snapshot)
    }

    async fn call_backend<F, T>(&self, operation: &'static str, call: F) -> MemoryResult<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.backend_timeout, call)
            .await
            .map_err(|_| {
                let timeout_ms = self.backend_timeout.as_millis();
                tracing::warn!(operation, timeout_ms, "backend call timed out");
                MemoryError::backend_unavailable(operation, format!("timed out after {timeout_ms} ms"))
            })
    }

    // =========================================================================
    // Residency
    // =========================================================================

    /// Least-recently-accessed resident record.
    #[must_use]
    pub fn select_victim(&self) -> Option<&VectorRecord> {
        self.entries
            .values()
            .min_by_key(|entry| entry.last_access_tick)
            .map(|entry| &entry.record)
    }

    /// Drop a record from L1, returning it.
    pub fn evict(&mut self, id: &str) -> Option<VectorRecord> {
        let entry = self.entries.remove(id)?;
        self.evictions += 1;
        tracing::debug!(id, "evicted from fast cache");
        Some(entry.record)
    }

    /// Bring a record back from L2.
    ///
    /// Already-resident records only count as an access. A full cache needs
    /// `replacing`, as for [`store`](Self::store).
    ///
    /// # Errors
    /// `CapacityExceeded` or `NotFound` as for [`store`](Self::store).
    pub fn rehydrate(&mut self, record: VectorRecord, replacing: Option<&str>) -> MemoryResult<()> {
        let now = self.clock.now_ms();
        if self.touch(&record.id, now).is_some() {
            return Ok(());
        }
        self.check_room(replacing)?;

        if let Some(victim) = replacing {
            self.evict(victim);
        }
        tracing::debug!(id = %record.id, "rehydrated into fast cache");
        self.insert_entry(record, now);
        self.rehydrations += 1;

        // Postcondition
        assert!(self.entries.len() <= self.capacity);
        Ok(())
    }

    /// Ids not accessed for at least `idle_ms`, least recent first.
    #[must_use]
    pub fn idle_ids(&self, idle_ms: u64) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut idle: Vec<&CacheEntry> = self
            .entries
            .values()
            .filter(|entry| now.saturating_sub(entry.last_access_ms) >= idle_ms)
            .collect();
        idle.sort_by_key(|entry| entry.last_access_tick);
        idle.into_iter().map(|entry| entry.record.id.clone()).collect()
    }

    fn check_room(&self, replacing: Option<&str>) -> MemoryResult<()> {
        if let Some(victim) = replacing {
            if !self.entries.contains_key(victim) {
                return Err(MemoryError::NotFound {
                    id: victim.to_string(),
                });
            }
            return Ok(());
        }
        if self.is_full() {
            return Err(MemoryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn touch(&mut self, id: &str, now: u64) -> Option<&VectorRecord> {
        let entry = self.entries.get_mut(id)?;
        self.tick += 1;
        entry.last_access_tick = self.tick;
        entry.last_access_ms = now;
        Some(&entry.record)
    }

    fn insert_entry(&mut self, record: VectorRecord, now: u64) {
        self.tick += 1;
        self.entries.insert(
            record.id.clone(),
            CacheEntry {
                record,
                last_access_tick: self.tick,
                last_access_ms: now,
            },
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Resident record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VectorRecord> {
        self.entries.get(id).map(|entry| &entry.record)
    }

    /// Whether `id` is resident.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Resident records in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<&VectorRecord> {
        let mut records: Vec<&VectorRecord> = self.entries.values().map(|e| &e.record).collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    /// Number of resident records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the next insert needs a replacement.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Maximum resident records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Statistics snapshot. Pure read.
    #[must_use]
    pub fn stats(&self) -> FastCacheStats {
        FastCacheStats {
            resident_count: self.entries.len(),
            capacity: self.capacity,
            dimensions: self.dimensions,
            model: self.model.clone(),
            write_count: self.write_count,
            query_count: self.query_count,
            evictions: self.evictions,
            rehydrations: self.rehydrations,
            last_write_ms: self.last_write_ms,
            backend: self.backend_stats.clone(),
            backend_refreshed_ms: self.backend_refreshed_ms,
        }
    }
}
