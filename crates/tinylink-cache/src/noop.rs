use async_trait::async_trait;
use std::time::Duration;
use tinylink_core::ShortCode;

use crate::{Result, UrlCache};

/// A cache that stores nothing, for running with caching disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl UrlCache for NoopCache {
    async fn get_url(&self, _code: &ShortCode) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_url(&self, _code: &ShortCode, _url: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _code: &ShortCode) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
