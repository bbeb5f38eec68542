//! Test doubles shared by the engine's unit tests.

use async_trait::async_trait;
use jiff::Timestamp;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tinylink_cache::{CacheError, CacheSettings, FailOpenCache, MokaUrlCache, UrlCache};
use tinylink_core::store::{MappingStore, ReadMappingStore, Result as StoreResult};
use tinylink_core::{Mapping, NewMapping, ShortCode, StorageError};
use tinylink_generator::{Generator, RandomGenerator};
use tinylink_storage::InMemoryStore;

use crate::ResolutionEngine;

/// Builds an engine around the given doubles with default cache settings.
pub(crate) fn engine_with<S, C, G>(store: S, cache: C, generator: G) -> ResolutionEngine<S, C, G>
where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
{
    ResolutionEngine::new(
        store,
        FailOpenCache::new(cache, CacheSettings::default()),
        generator,
    )
}

#[derive(Debug, Default)]
struct CallLog(Mutex<HashMap<&'static str, usize>>);

impl CallLog {
    fn record(&self, op: &'static str) {
        *self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_default() += 1;
    }

    fn get(&self, op: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

/// An in-memory store that counts calls and can be scripted to collide or fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    inner: InMemoryStore,
    calls: CallLog,
    exists_script: Mutex<VecDeque<bool>>,
    save_conflicts: Mutex<usize>,
    failure: Mutex<Option<StorageError>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answers the next `exists_by_code` calls from `answers`, then defers to the data.
    pub(crate) fn script_exists(&self, answers: impl IntoIterator<Item = bool>) {
        self.exists_script
            .lock()
            .unwrap()
            .extend(answers);
    }

    /// Rejects the next `n` saves with a conflict.
    pub(crate) fn script_save_conflicts(&self, n: usize) {
        *self.save_conflicts.lock().unwrap() = n;
    }

    /// Makes every subsequent call fail with `err`.
    pub(crate) fn fail_with(&self, err: StorageError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// Seeds a mapping without recording a call.
    pub(crate) async fn insert(&self, mapping: NewMapping) -> Mapping {
        self.inner.save(mapping).await.unwrap()
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls.get(op)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.total()
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        self.calls.record(op);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReadMappingStore for RecordingStore {
    async fn find_by_code(&self, code: &ShortCode) -> StoreResult<Option<Mapping>> {
        self.enter("find_by_code")?;
        self.inner.find_by_code(code).await
    }

    async fn find_by_url(&self, url: &str) -> StoreResult<Option<Mapping>> {
        self.enter("find_by_url")?;
        self.inner.find_by_url(url).await
    }

    async fn exists_by_code(&self, code: &ShortCode) -> StoreResult<bool> {
        self.enter("exists_by_code")?;
        let scripted = self.exists_script.lock().unwrap().pop_front();
        match scripted {
            Some(answer) => Ok(answer),
            None => self.inner.exists_by_code(code).await,
        }
    }

    async fn count(&self) -> StoreResult<u64> {
        self.enter("count")?;
        self.inner.count().await
    }

    async fn find_created_before(&self, cutoff: Timestamp) -> StoreResult<Vec<Mapping>> {
        self.enter("find_created_before")?;
        self.inner.find_created_before(cutoff).await
    }
}

#[async_trait]
impl MappingStore for RecordingStore {
    async fn save(&self, mapping: NewMapping) -> StoreResult<Mapping> {
        self.enter("save")?;
        {
            let mut conflicts = self.save_conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(StorageError::Conflict(mapping.short_code.to_string()));
            }
        }
        self.inner.save(mapping).await
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> StoreResult<u64> {
        self.enter("delete_created_before")?;
        self.inner.delete_created_before(cutoff).await
    }
}

/// A Moka-backed cache that counts `get`/`set`/`del` calls.
#[derive(Debug, Default)]
pub(crate) struct RecordingCache {
    inner: MokaUrlCache,
    calls: CallLog,
}

impl RecordingCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores an entry without recording a call.
    pub(crate) async fn prime(&self, code: &ShortCode, url: &str) {
        self.inner
            .set_url(code, url, Duration::from_secs(3600))
            .await
            .unwrap();
    }

    /// Reads an entry without recording a call.
    pub(crate) async fn peek(&self, code: &ShortCode) -> Option<String> {
        self.inner.get_url(code).await.unwrap()
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls.get(op)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.total()
    }
}

#[async_trait]
impl UrlCache for RecordingCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>, CacheError> {
        self.calls.record("get");
        self.inner.get_url(code).await
    }

    async fn set_url(&self, code: &ShortCode, url: &str, ttl: Duration) -> Result<(), CacheError> {
        self.calls.record("set");
        self.inner.set_url(code, url, ttl).await
    }

    async fn del(&self, code: &ShortCode) -> Result<(), CacheError> {
        self.calls.record("del");
        self.inner.del(code).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.calls.record("ping");
        self.inner.ping().await
    }
}

/// Hands out the given codes in order, then falls back to random codes.
#[derive(Debug)]
pub(crate) struct ScriptedGenerator {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn new<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            codes: Mutex::new(codes.into_iter().map(str::to_string).collect()),
        }
    }
}

impl Generator for ScriptedGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let next = self.codes.lock().unwrap().pop_front();
        match next {
            Some(code) => ShortCode::new_unchecked(code),
            None => RandomGenerator::new().generate(),
        }
    }
}
