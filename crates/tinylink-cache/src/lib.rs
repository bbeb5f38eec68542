//! Cache trait, backends, and the fail-open adapter used by the engine.

pub mod cache;
pub mod fail_open;
pub mod moka;
pub mod noop;
pub mod redis;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{Result, UrlCache, DEFAULT_KEY_PREFIX};
pub use fail_open::{CacheSettings, FailOpenCache};
pub use moka::MokaUrlCache;
pub use noop::NoopCache;
pub use redis::RedisUrlCache;
pub use tinylink_core::CacheError;
