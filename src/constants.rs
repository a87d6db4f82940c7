//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `FAST_CACHE_RECORDS_COUNT_MAX` (not `MAX_FAST_CACHE_RECORDS`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _`COUNT_MAX/DEFAULT` for quantity limits
//! - _MS for milliseconds

// =============================================================================
// Fast Cache (L1) Limits
// =============================================================================

/// Default number of records resident in the fast cache
pub const FAST_CACHE_RECORDS_COUNT_DEFAULT: usize = 10_000;

/// Maximum configurable fast cache capacity
pub const FAST_CACHE_RECORDS_COUNT_MAX: usize = 10_000_000;

// =============================================================================
// Vector Limits
// =============================================================================

/// Default embedding dimension
pub const VECTOR_DIMENSIONS_COUNT_DEFAULT: usize = 384;

/// Maximum embedding dimension accepted by the substrate
pub const VECTOR_DIMENSIONS_COUNT_MAX: usize = 4096;

/// Default embedding model name passed to the embedder
pub const EMBEDDING_MODEL_DEFAULT: &str = "all-minilm-l6-v2";

// =============================================================================
// Content Limits
// =============================================================================

/// Maximum size of stored content
pub const CONTENT_BYTES_MAX: usize = 100_000; // 100KB

/// Maximum size of a search query
pub const QUERY_BYTES_MAX: usize = 10_000;

/// Maximum number of metadata entries per record
pub const METADATA_ENTRIES_COUNT_MAX: usize = 64;

/// Maximum length of a metadata key
pub const METADATA_KEY_BYTES_MAX: usize = 256;

// =============================================================================
// Search Limits
// =============================================================================

/// Default number of search results (k)
pub const SEARCH_RESULTS_COUNT_DEFAULT: usize = 5;

/// Maximum number of search results (k)
pub const SEARCH_RESULTS_COUNT_MAX: usize = 100;

/// Default cap on related concepts attached to a search hit
pub const SEARCH_RELATED_COUNT_DEFAULT: usize = 10;

// =============================================================================
// Semantic Store (L3) Limits
// =============================================================================

/// Maximum length of a normalized concept key
pub const CONCEPT_KEY_BYTES_MAX: usize = 512;

// =============================================================================
// Persistent Store (L2)
// =============================================================================

/// Default namespace for persistent records
pub const PERSISTENT_NAMESPACE_DEFAULT: &str = "default";

/// Maximum length of a persistent namespace
pub const PERSISTENT_NAMESPACE_BYTES_MAX: usize = 128;

// =============================================================================
// Backend Limits
// =============================================================================

/// Default timeout for calls into the embedding/index service
pub const BACKEND_TIMEOUT_MS_DEFAULT: u64 = 5_000;

/// Maximum configurable backend timeout
pub const BACKEND_TIMEOUT_MS_MAX: u64 = 300_000; // 5 minutes

// =============================================================================
// Handle (actor) Limits
// =============================================================================

/// Capacity of the command channel feeding a substrate task
pub const HANDLE_COMMAND_QUEUE_COUNT_MAX: usize = 256;

// =============================================================================
// Telemetry
// =============================================================================

/// Log filter used when `RUST_LOG` is unset
pub const TELEMETRY_FILTER_DEFAULT: &str = "strata_memory=info";

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum number of simulation steps
pub const DST_SIMULATION_STEPS_MAX: u64 = 1_000_000;

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Maximum time advance per step in milliseconds
pub const DST_TIME_ADVANCE_MS_MAX: u64 = 86_400_000; // 24 hours

// =============================================================================
// Time Constants
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1000;
