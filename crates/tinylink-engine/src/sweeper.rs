use jiff::SignedDuration;
use std::sync::Arc;
use tinylink_cache::UrlCache;
use tinylink_core::{Clock, EngineError, MappingStore};
use tinylink_generator::Generator;
use tracing::info;

use crate::{ResolutionEngine, Result};

/// Deletes mappings older than a retention period.
///
/// "Now" is read from the engine's clock, so a sweep behaves the same
/// whether a scheduler or an operator triggers it.
pub struct RetentionSweeper<S, C, G, K> {
    engine: Arc<ResolutionEngine<S, C, G, K>>,
}

impl<S, C, G, K> Clone for RetentionSweeper<S, C, G, K> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S, C, G, K> RetentionSweeper<S, C, G, K>
where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
    K: Clock,
{
    pub fn new(engine: Arc<ResolutionEngine<S, C, G, K>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ResolutionEngine<S, C, G, K>> {
        &self.engine
    }

    /// Removes every mapping created more than `retention_days` days ago
    /// and returns how many were deleted.
    pub async fn sweep(&self, retention_days: u32) -> Result<u64> {
        let now = self.engine.clock().now();
        let retention = SignedDuration::from_hours(i64::from(retention_days) * 24);
        let cutoff = now.checked_sub(retention).map_err(|e| {
            EngineError::InvalidInput(format!(
                "retention of {retention_days} days is out of range: {e}"
            ))
        })?;

        info!(retention_days, cutoff = %cutoff, "Running retention sweep");
        let deleted = self.engine.expire_older_than(cutoff).await?;
        info!(retention_days, deleted, "Retention sweep finished");
        Ok(deleted)
    }
}
