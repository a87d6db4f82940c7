//! Semantic Store (L3) - Concept Keys and Temporal Log
//!
//! `TigerStyle`: Pure structural state, no backend calls.
//!
//! Content is normalized into a concept key and bound to the id of the
//! record it came from. Re-binding a key replaces the live entry; the
//! temporal log keeps every binding in insertion order and is never pruned.
//!
//! Relationship lookup goes through a [`RelationFinder`]. The default
//! [`SubstringRelationFinder`] matches on lexical containment only.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::record::ConceptRecord;
use crate::constants::CONCEPT_KEY_BYTES_MAX;
use crate::dst::Clock;

// =============================================================================
// Key Normalization
// =============================================================================

/// Normalize content into a concept key.
///
/// Trims, lowercases, collapses runs of whitespace to one space and
/// truncates to `CONCEPT_KEY_BYTES_MAX` bytes on a char boundary.
///
/// ```
/// use strata_memory::memory::normalize_concept_key;
/// assert_eq!(normalize_concept_key("  Rust   IS\tfun "), "rust is fun");
/// ```
#[must_use]
pub fn normalize_concept_key(content: &str) -> String {
    let mut key = content
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    if key.len() > CONCEPT_KEY_BYTES_MAX {
        let mut end = CONCEPT_KEY_BYTES_MAX;
        while !key.is_char_boundary(end) {
            end -= 1;
        }
        key.truncate(end);
        key.truncate(key.trim_end().len());
    }

    // Postcondition
    debug_assert!(key.len() <= CONCEPT_KEY_BYTES_MAX);
    key
}

// =============================================================================
// Relation Types
// =============================================================================

/// Kind of relationship to look up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Either key contains the other
    #[default]
    Similar,
    /// Candidate key contains the query (more specific)
    Narrower,
    /// Query contains the candidate key (more general)
    Broader,
}

impl RelationType {
    /// String form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Similar => "similar",
            Self::Narrower => "narrower",
            Self::Broader => "broader",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown relation type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relation type: {0:?} (expected similar, narrower or broader)")]
pub struct ParseRelationTypeError(String);

impl FromStr for RelationType {
    type Err = ParseRelationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similar" => Ok(Self::Similar),
            "narrower" => Ok(Self::Narrower),
            "broader" => Ok(Self::Broader),
            _ => Err(ParseRelationTypeError(s.to_string())),
        }
    }
}

// =============================================================================
// RelationFinder
// =============================================================================

/// Strategy for finding concepts related to a query key.
///
/// `query` is already normalized. Implementations return matches in the
/// iteration order of `concepts` (key order).
pub trait RelationFinder: Send + Sync + fmt::Debug {
    /// Return the concepts related to `query` under `relation`.
    fn find_related<'a>(
        &self,
        query: &str,
        relation: RelationType,
        concepts: &'a BTreeMap<String, ConceptRecord>,
    ) -> Vec<&'a ConceptRecord>;

    /// Strategy name for logging.
    fn name(&self) -> &'static str;
}

/// Case-insensitive substring containment over concept keys.
///
/// Keys are lowercase already, so containment on normalized strings is
/// case-insensitive. Lexical overlap only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRelationFinder;

impl RelationFinder for SubstringRelationFinder {
    fn find_related<'a>(
        &self,
        query: &str,
        relation: RelationType,
        concepts: &'a BTreeMap<String, ConceptRecord>,
    ) -> Vec<&'a ConceptRecord> {
        if query.is_empty() {
            return Vec::new();
        }

        concepts
            .iter()
            .filter(|(key, _)| match relation {
                RelationType::Similar => key.contains(query) || query.contains(key.as_str()),
                RelationType::Narrower => key.contains(query),
                RelationType::Broader => query.contains(key.as_str()),
            })
            .map(|(_, record)| record)
            .collect()
    }

    fn name(&self) -> &'static str {
        "substring"
    }
}

// =============================================================================
// SemanticStore
// =============================================================================

/// L3: concept key to record binding plus an append-only temporal log.
#[derive(Debug)]
pub struct SemanticStore {
    concepts: BTreeMap<String, ConceptRecord>,
    temporal_log: Vec<ConceptRecord>,
    finder: Box<dyn RelationFinder>,
    clock: Arc<dyn Clock>,
}

impl SemanticStore {
    /// Create an empty store using substring matching.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_finder(clock, Box::new(SubstringRelationFinder))
    }

    /// Create an empty store with a custom relation finder.
    #[must_use]
    pub fn with_finder(clock: Arc<dyn Clock>, finder: Box<dyn RelationFinder>) -> Self {
        Self {
            concepts: BTreeMap::new(),
            temporal_log: Vec::new(),
            finder,
            clock,
        }
    }

    /// Bind the concept derived from `content` to `vector_id`.
    ///
    /// An existing binding for the same key is replaced. The temporal log
    /// always grows by one.
    ///
    /// # Panics
    /// Panics if `vector_id` is empty.
    pub fn add_concept(&mut self, content: &str, vector_id: &str) -> ConceptRecord {
        // Precondition
        assert!(!vector_id.is_empty(), "vector_id must not be empty");

        let log_len_before = self.temporal_log.len();
        let record = ConceptRecord {
            key: normalize_concept_key(content),
            vector_id: vector_id.to_string(),
            created_at_ms: self.clock.now_ms(),
        };

        if let Some(previous) = self.concepts.insert(record.key.clone(), record.clone()) {
            tracing::debug!(
                key = %record.key,
                from = %previous.vector_id,
                to = %record.vector_id,
                "concept rebound"
            );
        }
        self.temporal_log.push(record.clone());

        // Postconditions
        debug_assert_eq!(self.temporal_log.len(), log_len_before + 1);
        debug_assert!(self.concepts.contains_key(&record.key));

        record
    }

    /// Concepts related to `concept` under `relation`.
    ///
    /// The query is normalized the same way keys are.
    #[must_use]
    pub fn find_related(&self, concept: &str, relation: RelationType) -> Vec<ConceptRecord> {
        let query = normalize_concept_key(concept);
        self.finder
            .find_related(&query, relation, &self.concepts)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Live binding for a (raw or normalized) concept.
    #[must_use]
    pub fn get(&self, concept: &str) -> Option<&ConceptRecord> {
        self.concepts.get(&normalize_concept_key(concept))
    }

    /// Live bindings that point at `vector_id`.
    #[must_use]
    pub fn concepts_for(&self, vector_id: &str) -> Vec<&ConceptRecord> {
        self.concepts
            .values()
            .filter(|record| record.vector_id == vector_id)
            .collect()
    }

    /// Number of live concept keys.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of bindings ever made.
    #[must_use]
    pub fn temporal_len(&self) -> usize {
        self.temporal_log.len()
    }

    /// Every binding in insertion order.
    #[must_use]
    pub fn temporal_log(&self) -> &[ConceptRecord] {
        &self.temporal_log
    }

    /// Name of the relation finder in use.
    #[must_use]
    pub fn finder_name(&self) -> &'static str {
        self.finder.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimClock;

    fn store() -> (SemanticStore, SimClock) {
        let clock = SimClock::at_ms(1_000);
        (SemanticStore::new(Arc::new(clock.clone())), clock)
    }

    fn keys(records: &[ConceptRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn test_normalize_trims_lowercases_collapses() {
        assert_eq!(normalize_concept_key("  Hello   WORLD \n"), "hello world");
        assert_eq!(normalize_concept_key("\t"), "");
    }

    #[test]
    fn test_normalize_truncates_on_char_boundary() {
        let content = "é".repeat(CONCEPT_KEY_BYTES_MAX);
        let key = normalize_concept_key(&content);

        assert!(key.len() <= CONCEPT_KEY_BYTES_MAX);
        assert!(key.chars().all(|c| c == 'é'));
    }

    // =========================================================================
    // add_concept
    // =========================================================================

    #[test]
    fn test_add_concept_records_time_and_key() {
        let (mut store, clock) = store();
        clock.advance_ms(500);

        let record = store.add_concept("Rust Ownership", "vec-1");

        assert_eq!(record.key, "rust ownership");
        assert_eq!(record.vector_id, "vec-1");
        assert_eq!(record.created_at_ms, 1_500);
        assert_eq!(store.concept_count(), 1);
        assert_eq!(store.temporal_len(), 1);
    }

    #[test]
    fn test_rebind_is_last_write_wins_and_log_grows() {
        let (mut store, _) = store();

        store.add_concept("coffee", "vec-1");
        store.add_concept("  COFFEE ", "vec-2");

        assert_eq!(store.concept_count(), 1);
        assert_eq!(store.get("coffee").unwrap().vector_id, "vec-2");
        assert_eq!(store.temporal_len(), 2);

        let log_ids: Vec<&str> = store
            .temporal_log()
            .iter()
            .map(|r| r.vector_id.as_str())
            .collect();
        assert_eq!(log_ids, vec!["vec-1", "vec-2"]);
    }

    #[test]
    fn test_concepts_for() {
        let (mut store, _) = store();
        store.add_concept("a", "vec-1");
        store.add_concept("b", "vec-2");
        store.add_concept("c", "vec-1");

        let bound: Vec<&str> = store
            .concepts_for("vec-1")
            .iter()
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(bound, vec!["a", "c"]);
    }

    #[test]
    #[should_panic(expected = "vector_id must not be empty")]
    fn test_empty_vector_id_panics() {
        let (mut store, _) = store();
        store.add_concept("x", "");
    }

    // =========================================================================
    // find_related
    // =========================================================================

    #[test]
    fn test_similar_is_bidirectional_containment() {
        let (mut store, _) = store();
        store.add_concept("coffee", "vec-1");
        store.add_concept("iced coffee recipe", "vec-2");
        store.add_concept("tea", "vec-3");

        let related = store.find_related("Iced Coffee", RelationType::Similar);

        // "coffee" is inside the query; the query is inside "iced coffee recipe".
        assert_eq!(keys(&related), vec!["coffee", "iced coffee recipe"]);
    }

    #[test]
    fn test_narrower_and_broader() {
        let (mut store, _) = store();
        store.add_concept("coffee", "vec-1");
        store.add_concept("iced coffee recipe", "vec-2");

        assert_eq!(
            keys(&store.find_related("iced coffee", RelationType::Narrower)),
            vec!["iced coffee recipe"]
        );
        assert_eq!(
            keys(&store.find_related("iced coffee", RelationType::Broader)),
            vec!["coffee"]
        );
    }

    #[test]
    fn test_find_related_includes_exact_match() {
        let (mut store, _) = store();
        store.add_concept("coffee", "vec-1");

        assert_eq!(
            keys(&store.find_related("coffee", RelationType::Similar)),
            vec!["coffee"]
        );
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let (mut store, _) = store();
        store.add_concept("coffee", "vec-1");

        assert!(store.find_related("   ", RelationType::Similar).is_empty());
    }

    #[test]
    fn test_find_related_does_not_touch_log() {
        let (mut store, _) = store();
        store.add_concept("coffee", "vec-1");
        let before = store.temporal_log().to_vec();

        let _ = store.find_related("coffee", RelationType::Similar);

        assert_eq!(store.temporal_log(), before.as_slice());
    }

    #[derive(Debug)]
    struct ExactFinder;

    impl RelationFinder for ExactFinder {
        fn find_related<'a>(
            &self,
            query: &str,
            _relation: RelationType,
            concepts: &'a BTreeMap<String, ConceptRecord>,
        ) -> Vec<&'a ConceptRecord> {
            concepts.get(query).into_iter().collect()
        }

        fn name(&self) -> &'static str {
            "exact"
        }
    }

    #[test]
    fn test_custom_finder() {
        let mut store = SemanticStore::with_finder(Arc::new(SimClock::new()), Box::new(ExactFinder));
        store.add_concept("coffee", "vec-1");
        store.add_concept("iced coffee", "vec-2");

        assert_eq!(store.finder_name(), "exact");
        assert_eq!(
            keys(&store.find_related("coffee", RelationType::Similar)),
            vec!["coffee"]
        );
    }

    // =========================================================================
    // RelationType
    // =========================================================================

    #[test]
    fn test_relation_type_parse() {
        assert_eq!("similar".parse::<RelationType>(), Ok(RelationType::Similar));
        assert_eq!(" Narrower ".parse::<RelationType>(), Ok(RelationType::Narrower));
        assert_eq!("broader".parse::<RelationType>(), Ok(RelationType::Broader));
        assert!("sibling".parse::<RelationType>().is_err());
        assert_eq!(RelationType::default(), RelationType::Similar);
        assert_eq!(RelationType::Broader.to_string(), "broader");
    }
}
