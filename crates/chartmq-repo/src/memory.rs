//! In-memory repository store
//!
//! Keeps entries in a map and counts operations, useful for dispatcher and
//! reconciler tests without a database file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::entry::RepositoryEntry;
use crate::error::{RepoError, Result};
use crate::store::RepositoryStore;

/// In-memory repository store for testing
#[derive(Clone, Default)]
pub struct MemoryRepositoryStore {
    entries: Arc<RwLock<BTreeMap<String, RepositoryEntry>>>,
    operations: Arc<RwLock<StoreOperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreOperationCounts {
    pub upserts: usize,
    pub lists: usize,
    pub gets: usize,
    pub deletes: usize,
}

fn poisoned() -> RepoError {
    RepoError::Unavailable {
        message: "in-memory store lock poisoned".to_string(),
    }
}

impl MemoryRepositoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated entries
    pub fn with_entries(entries: Vec<RepositoryEntry>) -> Self {
        let map = entries.into_iter().map(|e| (e.name.clone(), e)).collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
            operations: Arc::default(),
        }
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> StoreOperationCounts {
        self.operations
            .read()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, f: impl FnOnce(&mut StoreOperationCounts)) -> Result<()> {
        let mut ops = self.operations.write().map_err(|_| poisoned())?;
        f(&mut ops);
        Ok(())
    }
}

#[async_trait]
impl RepositoryStore for MemoryRepositoryStore {
    async fn upsert(&self, entry: &RepositoryEntry) -> Result<()> {
        self.record(|ops| ops.upserts += 1)?;
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(entry.name.clone(), entry.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<RepositoryEntry>> {
        self.record(|ops| ops.lists += 1)?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<RepositoryEntry>> {
        self.record(|ops| ops.gets += 1)?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.record(|ops| ops.deletes += 1)?;
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(name).is_some())
    }
}
