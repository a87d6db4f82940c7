//! Simulated Persistent Store (for DST)
//!
//! `TigerStyle`: In-memory map with fault injection at `cold_store_write`
//! (`put`) and `cold_store_read` (`get`, `has`).
//!
//! `remove` is never faulted: it only undoes puts from a failed operation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{PersistentError, PersistentStore};
use crate::constants::PERSISTENT_NAMESPACE_DEFAULT;
use crate::dst::FaultInjector;
use crate::memory::record::VectorRecord;

/// In-memory persistent store for deterministic simulation testing.
///
/// Clones share the same records.
#[derive(Clone, Debug)]
pub struct SimPersistentStore {
    namespace: String,
    records: Arc<Mutex<BTreeMap<String, VectorRecord>>>,
    fault_injector: Option<Arc<FaultInjector>>,
}

impl SimPersistentStore {
    /// Create an empty store in the default namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespace(PERSISTENT_NAMESPACE_DEFAULT)
    }

    /// Create an empty store in `namespace`.
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: Arc::new(Mutex::new(BTreeMap::new())),
            fault_injector: None,
        }
    }

    /// Enable fault injection.
    #[must_use]
    pub fn with_faults(mut self, fault_injector: Arc<FaultInjector>) -> Self {
        self.fault_injector = Some(fault_injector);
        self
    }

    /// Ids currently stored, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, VectorRecord>> {
        self.records.lock().expect("sim persistent store lock poisoned")
    }

    fn should_inject_fault(&self, fault_point: &str) -> bool {
        self.fault_injector
            .as_ref()
            .is_some_and(|injector| injector.should_inject(fault_point).is_some())
    }
}

impl Default for SimPersistentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for SimPersistentStore {
    async fn put(&self, record: &VectorRecord) -> Result<(), PersistentError> {
        // Precondition
        assert!(!record.id.is_empty(), "record id must not be empty");

        if self.should_inject_fault("cold_store_write") {
            return Err(PersistentError::write("injected: cold store write failed"));
        }

        let mut records = self.lock();
        if let Some(existing) = records.get(&record.id) {
            if existing != record {
                return Err(PersistentError::conflict(&record.id));
            }
            return Ok(());
        }
        records.insert(record.id.clone(), record.clone());

        // Postcondition
        debug_assert!(records.contains_key(&record.id), "record must be stored");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>, PersistentError> {
        if self.should_inject_fault("cold_store_read") {
            return Err(PersistentError::read("injected: cold store read failed"));
        }
        Ok(self.lock().get(id).cloned())
    }

    async fn has(&self, id: &str) -> Result<bool, PersistentError> {
        if self.should_inject_fault("cold_store_read") {
            return Err(PersistentError::read("injected: cold store read failed"));
        }
        Ok(self.lock().contains_key(id))
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistentError> {
        Ok(self.lock().remove(id).is_some())
    }

    async fn len(&self) -> Result<usize, PersistentError> {
        Ok(self.lock().len())
    }

    fn stored_ids(&self) -> Result<Vec<String>, PersistentError> {
        Ok(self.ids())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}
