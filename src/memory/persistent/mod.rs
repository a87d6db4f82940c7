//! Persistent Store (L2) - Durable Overflow Tier
//!
//! `TigerStyle`: Trait contract, simulation and file implementations.
//!
//! L2 receives records evicted from the fast cache and hands them back on
//! cold access. A substrate without a persistent store treats capacity
//! pressure as a hard error instead of dropping records.
//!
//! # Architecture
//!
//! ```text
//! PersistentStore (trait)
//! ├── SimPersistentStore   (in-memory, fault injection)
//! └── FilePersistentStore  (one JSON file per record)
//! ```

mod file;
mod sim;

pub use file::FilePersistentStore;
pub use sim::SimPersistentStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::record::VectorRecord;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from a persistent store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistentError {
    /// Write failed
    #[error("write failed: {message}")]
    Write {
        /// Reason
        message: String,
    },

    /// Read failed
    #[error("read failed: {message}")]
    Read {
        /// Reason
        message: String,
    },

    /// Stored bytes could not be (de)serialized
    #[error("serialization failed: {message}")]
    Serialization {
        /// Reason
        message: String,
    },

    /// Id cannot be used as a storage key
    #[error("invalid record id: {id:?}")]
    InvalidId {
        /// Rejected id
        id: String,
    },

    /// Namespace cannot be used as a storage path
    #[error("invalid namespace: {namespace:?}")]
    InvalidNamespace {
        /// Rejected namespace
        namespace: String,
    },

    /// A different record is already stored under this id
    #[error("conflicting record already stored under {id:?}")]
    Conflict {
        /// Contested id
        id: String,
    },
}

impl PersistentError {
    /// Create a write error.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Create a read error.
    #[must_use]
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// L2 summary included in substrate stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentStats {
    /// Store implementation name
    pub backend: String,
    /// Namespace records are kept under
    pub namespace: String,
    /// Records held in the namespace, including those found at startup
    pub record_count: usize,
}

// =============================================================================
// PersistentStore Trait
// =============================================================================

/// Durable record storage keyed by record id within a namespace.
#[async_trait]
pub trait PersistentStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a record.
    ///
    /// The record is stored as given, including its `created_at_ms`.
    /// Writing a record identical to the stored one is a no-op; a stored
    /// record is never replaced by a different one.
    ///
    /// # Errors
    /// - [`PersistentError::Conflict`] if a different record holds the id
    /// - other [`PersistentError`]s if the write fails
    async fn put(&self, record: &VectorRecord) -> Result<(), PersistentError>;

    /// Fetch a record. `Ok(None)` is a normal miss.
    ///
    /// # Errors
    /// Returns [`PersistentError`] if the read fails.
    async fn get(&self, id: &str) -> Result<Option<VectorRecord>, PersistentError>;

    /// Whether a record exists.
    ///
    /// # Errors
    /// Returns [`PersistentError`] if the read fails.
    async fn has(&self, id: &str) -> Result<bool, PersistentError>;

    /// Delete a record, returning whether it existed.
    ///
    /// Only used to undo a `put` that belonged to a failed operation.
    ///
    /// # Errors
    /// Returns [`PersistentError`] if the delete fails.
    async fn remove(&self, id: &str) -> Result<bool, PersistentError>;

    /// Number of records in the namespace.
    ///
    /// # Errors
    /// Returns [`PersistentError`] if the store cannot be listed.
    async fn len(&self) -> Result<usize, PersistentError>;

    /// Ids of every record in the namespace, sorted.
    ///
    /// Read once when a substrate is assembled, so it may block on I/O.
    ///
    /// # Errors
    /// Returns [`PersistentError`] if the store cannot be listed.
    fn stored_ids(&self) -> Result<Vec<String>, PersistentError>;

    /// Namespace this store writes under.
    fn namespace(&self) -> &str;

    /// Implementation name for logging and stats.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PersistentError::write("disk full").to_string(),
            "write failed: disk full"
        );
        assert_eq!(
            PersistentError::InvalidId {
                id: String::new()
            }
            .to_string(),
            "invalid record id: \"\""
        );
        assert_eq!(
            PersistentError::conflict("vec-1").to_string(),
            "conflicting record already stored under \"vec-1\""
        );
    }
}
