use crate::error::StorageError;
use crate::mapping::{Mapping, NewMapping};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of the durable mapping store.
#[async_trait]
pub trait ReadMappingStore: Send + Sync + 'static {
    /// Retrieves the mapping for a given short code.
    /// Returns `None` if the code does not exist.
    async fn find_by_code(&self, code: &ShortCode) -> Result<Option<Mapping>>;

    /// Retrieves a mapping whose long URL equals `url` exactly.
    async fn find_by_url(&self, url: &str) -> Result<Option<Mapping>>;

    /// Checks whether a short code is already taken.
    async fn exists_by_code(&self, code: &ShortCode) -> Result<bool>;

    /// Returns the total number of stored mappings.
    async fn count(&self) -> Result<u64>;

    /// Lists every mapping created strictly before `cutoff`.
    async fn find_created_before(&self, cutoff: Timestamp) -> Result<Vec<Mapping>>;
}

#[async_trait]
pub trait MappingStore: ReadMappingStore {
    /// Persists a new mapping, assigning its id (and creation time if absent).
    ///
    /// Returns `Err(StorageError::Conflict)` if the short code already exists.
    async fn save(&self, mapping: NewMapping) -> Result<Mapping>;

    /// Deletes every mapping created strictly before `cutoff` in one bulk
    /// operation and returns the number of rows removed.
    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64>;
}
