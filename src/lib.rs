//! # Strata Memory
//!
//! A tiered semantic memory substrate for AI agents with deterministic
//! simulation testing.
//!
//! ## Features
//!
//! - **Bounded hot set**: the fast cache never grows past its capacity; the
//!   least recently used record moves to the persistent tier instead of
//!   being dropped
//! - **Cold rehydration**: search hits that left the fast cache are read
//!   back from the persistent tier and cached again
//! - **Concept enrichment**: every result carries the concepts whose keys
//!   overlap its content
//! - **Atomic operations**: a failed store, search or consolidation leaves
//!   every tier as it was
//! - **Deterministic testing**: seeded embedder, simulated index and clock,
//!   fault injection at every backend call
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_memory::{Metadata, SearchOptions, Substrate};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! // Simulated embedder and index (deterministic, seed 42)
//! let mut substrate = Substrate::sim(42);
//!
//! substrate
//!     .store("Alice is a software engineer at Acme Corp", Metadata::new().with("source", "chat"))
//!     .await
//!     .unwrap();
//!
//! let results = substrate
//!     .search("Alice is a software engineer at Acme Corp", SearchOptions::new())
//!     .await
//!     .unwrap();
//!
//! for result in &results {
//!     println!("{:.3} {} ({} related)", result.score, result.content, result.related_concepts.len());
//! }
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            SubstrateHandle (one task, many callers)      │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Substrate (orchestrator)                 │
//! ├─────────────────────────────────────────────────────────┤
//! │  L1 FastCache       │ Embedder + VectorIndex, LRU set   │
//! │  L2 PersistentStore │ Evicted records (memory or disk)  │
//! │  L3 SemanticStore   │ Concept keys + temporal log       │
//! ├─────────────────────────────────────────────────────────┤
//! │  DST Framework      │ Fault injection + simulation      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - [`Substrate`] - Orchestrator: `store`, `search`, `consolidate`, `stats`
//! - [`SubstrateHandle`] - Cloneable handle to a substrate owned by a task
//! - [`FastCache`] - L1 working set in front of the embedder and index
//! - [`PersistentStore`] - L2 contract, with [`SimPersistentStore`] and
//!   [`FilePersistentStore`]
//! - [`SemanticStore`] - L3 concept bindings and relation lookup
//!
//! ## Simulation-First Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! ```rust
//! use strata_memory::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//! use strata_memory::{Metadata, SubstrateConfig};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let sim = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::EmbeddingTimeout, 0.1));
//!
//! sim.run(|env| async move {
//!     // Same seed = same faults = reproducible bugs
//!     let mut substrate = env.substrate(SubstrateConfig::default().with_dimensions(16))?;
//!     let _ = substrate.store("hello", Metadata::new()).await;
//!     Ok::<_, anyhow::Error>(())
//! })
//! .await
//! .unwrap();
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod dst;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod substrate;
pub mod telemetry;

// Re-export common types
pub use dst::{
    create_simulation, test_seeds, Clock, DeterministicRng, FaultConfig, FaultInjector, FaultType,
    PropertyTest, PropertyTestFailure, PropertyTestResult, PropertyTestable, SimClock, SimConfig,
    SimEnvironment, Simulation, SystemClock, TimeAdvanceConfig,
};
pub use embedding::{Embedder, EmbeddingError, SimEmbedder};
pub use error::{MemoryError, MemoryResult};
pub use index::{IndexError, IndexHit, IndexStats, SimVectorIndex, VectorIndex};
pub use memory::{
    CacheHit, ConceptRecord, FastCache, FastCacheStats, FilePersistentStore, Metadata,
    MetadataError, PersistentError, PersistentStats, PersistentStore, RelationFinder,
    RelationType, SemanticStore, SimPersistentStore, SubstringRelationFinder, VectorRecord,
};
pub use substrate::{
    ConfigError, ConsolidationReport, EnrichedResult, MemoryStats, PersistentConfig,
    SearchOptions, StorageResult, Substrate, SubstrateBuilder, SubstrateConfig, SubstrateHandle,
    Tier,
};
pub use telemetry::{init_tracing, init_tracing_with, TelemetryConfig, TelemetryError};
