use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::{CacheError, ShortCode};

pub type Result<T> = std::result::Result<T, CacheError>;

/// Prefix prepended to a short code to form its key in shared caches.
pub const DEFAULT_KEY_PREFIX: &str = "url:";

/// A cache mapping short codes to long URLs.
///
/// Backends report failures through [`CacheError`]; the engine only talks
/// to them through [`FailOpenCache`](crate::FailOpenCache), which turns
/// every failure into a miss or a no-op.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get the long URL cached for `code`.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Store the long URL for `code`, expiring after `ttl`.
    async fn set_url(&self, code: &ShortCode, url: &str, ttl: Duration) -> Result<()>;

    /// Remove the entry for `code`.
    ///
    /// It is not an error if the key does not exist.
    async fn del(&self, code: &ShortCode) -> Result<()>;

    /// Lightweight connectivity probe.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl<T: UrlCache + ?Sized> UrlCache for Box<T> {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        (**self).get_url(code).await
    }

    async fn set_url(&self, code: &ShortCode, url: &str, ttl: Duration) -> Result<()> {
        (**self).set_url(code, url, ttl).await
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        (**self).del(code).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

#[async_trait]
impl<T: UrlCache + ?Sized> UrlCache for Arc<T> {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        (**self).get_url(code).await
    }

    async fn set_url(&self, code: &ShortCode, url: &str, ttl: Duration) -> Result<()> {
        (**self).set_url(code, url, ttl).await
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        (**self).del(code).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MokaUrlCache;

    #[tokio::test]
    async fn boxed_cache_delegates() {
        let cache: Box<dyn UrlCache> = Box::new(MokaUrlCache::new());
        let code = ShortCode::new_unchecked("abc123");

        cache
            .set_url(&code, "https://example.com", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get_url(&code).await.unwrap().as_deref(),
            Some("https://example.com")
        );

        cache.del(&code).await.unwrap();
        assert!(cache.get_url(&code).await.unwrap().is_none());
        cache.ping().await.unwrap();
    }

    #[tokio::test]
    async fn shared_cache_sees_writes_through_clones() {
        let cache = Arc::new(MokaUrlCache::new());
        let other = Arc::clone(&cache);
        let code = ShortCode::new_unchecked("abc123");

        cache
            .set_url(&code, "https://example.com", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(other.get_url(&code).await.unwrap().is_some());
    }
}
