use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use tinylink_core::store::{MappingStore, ReadMappingStore, Result};
use tinylink_core::{Mapping, MappingId, NewMapping, ShortCode, StorageError};
use tracing::trace;

/// In-memory implementation of the mapping store using DashMap.
///
/// Mappings are keyed by short code. The entry API gives an atomic
/// insert-if-vacant, which is how the store enforces code uniqueness.
/// Identifiers come from a monotonically increasing sequence starting at 1.
#[derive(Debug)]
pub struct InMemoryStore {
    storage: DashMap<String, Mapping>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadMappingStore for InMemoryStore {
    async fn find_by_code(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        Ok(self
            .storage
            .get(code.as_str())
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Mapping>> {
        let earliest = self
            .storage
            .iter()
            .filter(|entry| entry.long_url == url)
            .min_by_key(|entry| (entry.created_at, entry.id))
            .map(|entry| entry.value().clone());

        Ok(earliest)
    }

    async fn exists_by_code(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(code.as_str()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.storage.len() as u64)
    }

    async fn find_created_before(&self, cutoff: Timestamp) -> Result<Vec<Mapping>> {
        let mut mappings: Vec<Mapping> = self
            .storage
            .iter()
            .filter(|entry| entry.created_at < cutoff)
            .map(|entry| entry.value().clone())
            .collect();
        mappings.sort_by_key(|m| (m.created_at, m.id));

        Ok(mappings)
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn save(&self, mapping: NewMapping) -> Result<Mapping> {
        match self.storage.entry(mapping.short_code.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(mapping.short_code.to_string())),
            Entry::Vacant(slot) => {
                let id = MappingId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                let saved = mapping.into_mapping(id);
                trace!(code = %saved.short_code, id = %saved.id, "Stored mapping in memory");
                slot.insert(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64> {
        let mut removed = 0u64;
        self.storage.retain(|_, mapping| {
            let keep = mapping.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}
