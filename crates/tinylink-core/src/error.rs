use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache initialization failed: {0}")]
    Initialization(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by the resolution engine's public operations.
///
/// Cache failures never appear here: they are absorbed by the fail-open
/// cache adapter. Store failures are carried opaquely in [`EngineError::Backend`].
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("failed to generate a unique short code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },
    #[error("storage backend failure: {0}")]
    Backend(#[from] StorageError),
}

impl EngineError {
    /// Returns `true` if the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotFound(_))
    }

    /// Returns `true` if the failure originated on the server side.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}
