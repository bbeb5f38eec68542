//! Misbehaving caches for exercising the fail-open path.

use async_trait::async_trait;
use std::time::Duration;
use tinylink_core::{CacheError, ShortCode};

use crate::{Result, UrlCache};

/// A cache whose every call fails as if the backend refused the connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrokenCache;

#[async_trait]
impl UrlCache for BrokenCache {
    async fn get_url(&self, _code: &ShortCode) -> Result<Option<String>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_url(&self, _code: &ShortCode, _url: &str, _ttl: Duration) -> Result<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn del(&self, _code: &ShortCode) -> Result<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// A cache whose every call never completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HangingCache;

#[async_trait]
impl UrlCache for HangingCache {
    async fn get_url(&self, _code: &ShortCode) -> Result<Option<String>> {
        std::future::pending().await
    }

    async fn set_url(&self, _code: &ShortCode, _url: &str, _ttl: Duration) -> Result<()> {
        std::future::pending().await
    }

    async fn del(&self, _code: &ShortCode) -> Result<()> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<()> {
        std::future::pending().await
    }
}
