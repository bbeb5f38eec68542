use std::future::Future;
use std::time::Duration;
use tinylink_core::{CacheError, ShortCode};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

use crate::{Result, UrlCache};

/// Process-wide cache settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CacheSettings {
    /// Time-to-live applied to every entry written by the engine.
    #[builder(default = Duration::from_secs(3600))]
    pub ttl: Duration,
    /// Upper bound on any single backend call.
    #[builder(default = Duration::from_millis(500))]
    pub op_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Wraps a [`UrlCache`] so that no cache failure ever reaches the caller.
///
/// Every backend call is bounded by `op_timeout`. Errors and timeouts are
/// logged and collapsed: reads become misses, writes and evictions become
/// no-ops, and the health probe reports `false`.
#[derive(Debug, Clone)]
pub struct FailOpenCache<C> {
    inner: C,
    settings: CacheSettings,
}

impl<C: UrlCache> FailOpenCache<C> {
    pub fn new(inner: C, settings: CacheSettings) -> Self {
        Self { inner, settings }
    }

    /// Returns a reference to the wrapped backend.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Returns the TTL applied to cached entries.
    pub fn ttl(&self) -> Duration {
        self.settings.ttl
    }

    /// Looks up `code`, treating any failure as a miss.
    pub async fn get(&self, code: &ShortCode) -> Option<String> {
        match self.bounded("get", self.inner.get_url(code)).await {
            Ok(Some(url)) => {
                debug!(code = %code, "Cache hit");
                Some(url)
            }
            Ok(None) => {
                debug!(code = %code, "Cache miss");
                None
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Caches `url` under `code` with the configured TTL. Failures are logged and dropped.
    pub async fn set(&self, code: &ShortCode, url: &str) {
        let ttl = self.settings.ttl;
        match self.bounded("set", self.inner.set_url(code, url, ttl)).await {
            Ok(()) => {
                trace!(code = %code, ttl_secs = ttl.as_secs(), "Cached URL mapping");
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to cache URL mapping");
            }
        }
    }

    /// Removes `code` from the cache. Failures are logged and dropped.
    pub async fn evict(&self, code: &ShortCode) {
        match self.bounded("del", self.inner.del(code)).await {
            Ok(()) => {
                trace!(code = %code, "Evicted URL mapping from cache");
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to evict URL mapping from cache");
            }
        }
    }

    /// Reports whether the backend answers a ping within the timeout.
    pub async fn is_available(&self) -> bool {
        match self.bounded("ping", self.inner.ping()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache is not available");
                false
            }
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.settings.op_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "cache {operation} exceeded {}ms",
                limit.as_millis()
            ))),
        }
    }
}
