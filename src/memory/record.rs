//! Records - Values Held by the Tiers
//!
//! `TigerStyle`: Plain data, serializable, validated at the store boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{METADATA_ENTRIES_COUNT_MAX, METADATA_KEY_BYTES_MAX};

// =============================================================================
// Metadata
// =============================================================================

/// Errors from building or validating [`Metadata`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// JSON input was not an object
    #[error("metadata must be a JSON object, got {kind}")]
    NotAnObject {
        /// JSON kind that was supplied
        kind: &'static str,
    },

    /// JSON text could not be parsed
    #[error("metadata is not valid JSON: {message}")]
    Json {
        /// Parser message
        message: String,
    },

    /// A key was empty
    #[error("metadata key is empty")]
    EmptyKey,

    /// A key exceeds the size limit
    #[error("metadata key too long: {len} bytes (max {max})")]
    KeyTooLong {
        /// Actual length
        len: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Too many entries
    #[error("too many metadata entries: {count} (max {max})")]
    TooManyEntries {
        /// Actual count
        count: usize,
        /// Maximum allowed
        max: usize,
    },
}

/// String-keyed, string-valued record metadata.
///
/// Every value is coerced to a string on the way in, so callers can pass
/// numbers or booleans and get their display form back.
///
/// ```
/// use strata_memory::Metadata;
///
/// let metadata = Metadata::new().with("source", "chat").with("turn", 3);
/// assert_eq!(metadata.get("turn"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an entry, coercing the value to a string.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> Option<String> {
        self.0.insert(key.into(), value.to_string())
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Coerce a JSON object into metadata.
    ///
    /// Strings are kept verbatim, other scalars use their JSON text
    /// (`3`, `true`, `null`), arrays and objects are stored as compact JSON.
    ///
    /// # Errors
    /// Returns [`MetadataError`] if `value` is not an object or an entry is invalid.
    pub fn from_json(value: &Value) -> Result<Self, MetadataError> {
        let Value::Object(object) = value else {
            return Err(MetadataError::NotAnObject {
                kind: json_kind(value),
            });
        };

        let metadata: Self = object
            .iter()
            .map(|(key, value)| {
                let coerced = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), coerced)
            })
            .collect();

        metadata.validate()?;
        Ok(metadata)
    }

    /// Parse JSON text and coerce it with [`from_json`](Self::from_json).
    ///
    /// # Errors
    /// Returns [`MetadataError`] if the text is not a valid JSON object.
    pub fn parse_json(text: &str) -> Result<Self, MetadataError> {
        let value: Value = serde_json::from_str(text).map_err(|e| MetadataError::Json {
            message: e.to_string(),
        })?;
        Self::from_json(&value)
    }

    /// Check entry count and key limits.
    ///
    /// # Errors
    /// Returns the first violated limit.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.0.len() > METADATA_ENTRIES_COUNT_MAX {
            return Err(MetadataError::TooManyEntries {
                count: self.0.len(),
                max: METADATA_ENTRIES_COUNT_MAX,
            });
        }

        for key in self.0.keys() {
            if key.is_empty() {
                return Err(MetadataError::EmptyKey);
            }
            if key.len() > METADATA_KEY_BYTES_MAX {
                return Err(MetadataError::KeyTooLong {
                    len: key.len(),
                    max: METADATA_KEY_BYTES_MAX,
                });
            }
        }

        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for Metadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// VectorRecord
// =============================================================================

/// A stored embedding plus its provenance.
///
/// Tiers only hand out clones, so a record is never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Index-assigned id, unique for the substrate lifetime
    pub id: String,
    /// Embedding of `content`
    pub vector: Vec<f32>,
    /// Source text
    pub content: String,
    /// Creation time (ms since epoch)
    pub created_at_ms: u64,
    /// Caller metadata
    pub metadata: Metadata,
    /// Substrate-wide insertion ordinal, used to break score ties
    pub sequence: u64,
}

impl VectorRecord {
    /// Creation time as a `DateTime<Utc>`.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        ms_to_datetime(self.created_at_ms)
    }
}

// =============================================================================
// ConceptRecord
// =============================================================================

/// A normalized concept key bound to a vector id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRecord {
    /// Normalized concept key
    pub key: String,
    /// Referenced record id (not owned)
    pub vector_id: String,
    /// When this binding was made (ms since epoch)
    pub created_at_ms: u64,
}

pub(crate) fn ms_to_datetime(ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
