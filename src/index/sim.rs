//! Simulated Vector Index (for DST)
//!
//! `TigerStyle`: Brute-force cosine search over an in-memory list.
//!
//! Entries are kept in insertion order and sorted with a stable sort, so
//! equal scores come back earliest-stored first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{IndexError, IndexHit, IndexStats, VectorIndex};
use crate::dst::{FaultInjector, FaultType};
use crate::memory::Metadata;

#[derive(Debug)]
struct IndexEntry {
    id: String,
    vector: Vec<f32>,
    payload: Metadata,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    next_id: u64,
    query_count: u64,
}

/// In-memory vector index for deterministic simulation testing.
///
/// Clones share the same state.
#[derive(Clone, Debug)]
pub struct SimVectorIndex {
    dimensions: usize,
    state: Arc<Mutex<IndexState>>,
    fault_injector: Option<Arc<FaultInjector>>,
    latency: Option<Duration>,
}

impl SimVectorIndex {
    /// Create an empty index for vectors of `dimensions` components.
    ///
    /// # Panics
    /// Panics if `dimensions` is zero.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");

        Self {
            dimensions,
            state: Arc::new(Mutex::new(IndexState::default())),
            fault_injector: None,
            latency: None,
        }
    }

    /// Enable fault injection at the `index_*` fault points.
    #[must_use]
    pub fn with_faults(mut self, fault_injector: Arc<FaultInjector>) -> Self {
        self.fault_injector = Some(fault_injector);
        self
    }

    /// Delay every call by `latency` (simulated network round trip).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cosine similarity mapped from [-1, 1] to [0, 1].
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        // Preconditions
        assert_eq!(a.len(), b.len(), "vectors must have same length");
        assert!(!a.is_empty(), "vectors must not be empty");

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
        (similarity + 1.0) / 2.0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexState> {
        self.state.lock().expect("sim index lock poisoned")
    }

    async fn simulate_call(&self, fault_point: &str) -> Result<Option<FaultType>, IndexError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self
            .fault_injector
            .as_ref()
            .and_then(|injector| injector.should_inject(fault_point));

        if fault == Some(FaultType::IndexUnavailable) {
            return Err(IndexError::unavailable("injected: index unavailable"));
        }
        Ok(fault)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SimVectorIndex {
    #[tracing::instrument(skip(self, vector, metadata), fields(dimensions = vector.len()))]
    async fn store_vector(
        &self,
        vector: &[f32],
        metadata: &Metadata,
    ) -> Result<String, IndexError> {
        self.check_dimensions(vector)?;

        if self.simulate_call("index_store").await? == Some(FaultType::IndexStoreFail) {
            return Err(IndexError::store_failed("injected: index store failed"));
        }

        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("vec-{}", state.next_id);
        state.entries.push(IndexEntry {
            id: id.clone(),
            vector: vector.to_vec(),
            payload: metadata.clone(),
        });

        // Postcondition
        debug_assert_eq!(
            state.entries.last().map(|e| e.id.as_str()),
            Some(id.as_str())
        );
        Ok(id)
    }

    #[tracing::instrument(skip(self, query))]
    async fn search_vectors(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::invalid_request("k must be positive"));
        }
        self.check_dimensions(query)?;

        if self.simulate_call("index_search").await? == Some(FaultType::IndexSearchFail) {
            return Err(IndexError::search_failed("injected: index search failed"));
        }

        let mut state = self.lock();
        state.query_count += 1;

        let mut hits: Vec<IndexHit> = state
            .entries
            .iter()
            .map(|entry| IndexHit {
                id: entry.id.clone(),
                score: Self::cosine_similarity(query, &entry.vector),
                payload: entry.payload.clone(),
            })
            .collect();

        // Stable: ties keep insertion order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        // Postcondition
        debug_assert!(hits.len() <= k, "results must not exceed k");
        Ok(hits)
    }

    async fn memory_stats(&self) -> Result<IndexStats, IndexError> {
        if self.simulate_call("index_stats").await? == Some(FaultType::IndexStatsFail) {
            return Err(IndexError::stats_failed("injected: index stats failed"));
        }

        let state = self.lock();
        Ok(IndexStats {
            vector_count: state.entries.len(),
            dimensions: self.dimensions,
            query_count: state.query_count,
        })
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}
