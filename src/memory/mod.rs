//! Memory Tiers
//!
//! `TigerStyle`: Each tier owns its state; the substrate composes them.
//!
//! | Tier | Type | Holds |
//! |------|------|-------|
//! | L1 | [`FastCache`] | bounded hot set of [`VectorRecord`]s |
//! | L2 | [`PersistentStore`] | records evicted from L1 |
//! | L3 | [`SemanticStore`] | concept keys and the temporal log |

mod fast_cache;
mod persistent;
mod record;
mod semantic;

pub use fast_cache::{CacheHit, FastCache, FastCacheStats};
pub use persistent::{
    FilePersistentStore, PersistentError, PersistentStats, PersistentStore, SimPersistentStore,
};
pub use record::{ConceptRecord, Metadata, MetadataError, VectorRecord};
pub(crate) use record::ms_to_datetime;
pub use semantic::{
    normalize_concept_key, ParseRelationTypeError, RelationFinder, RelationType, SemanticStore,
    SubstringRelationFinder,
};
