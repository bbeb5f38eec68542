use jiff::Timestamp;
use std::sync::Arc;
use tinylink_cache::{FailOpenCache, UrlCache};
use tinylink_core::{
    normalize_url, Clock, EngineError, Mapping, MappingStore, NewMapping, ShortCode,
    StorageError, SystemClock, MAX_URL_LENGTH,
};
use tinylink_generator::Generator;
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

use crate::Result;

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "tinylink::audit";

/// Tunables of the allocation path.
#[derive(Debug, Clone, TypedBuilder)]
pub struct EngineSettings {
    /// Candidate codes tried before giving up on a creation.
    #[builder(default = 5)]
    pub max_attempts: u32,
    /// Longest accepted long URL, in characters, after normalization.
    #[builder(default = MAX_URL_LENGTH)]
    pub max_url_length: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Allocates short codes for long URLs and resolves them back.
///
/// The store is the source of truth. The cache sits in front of it for
/// reads and is populated on creation and on every store fallback; it is
/// only reached through [`FailOpenCache`], so a broken or slow cache never
/// fails an operation.
///
/// The engine holds no mutable state of its own and is meant to be shared
/// behind an `Arc` by concurrent callers.
pub struct ResolutionEngine<S, C, G, K = SystemClock> {
    store: Arc<S>,
    cache: FailOpenCache<C>,
    generator: G,
    clock: K,
    settings: EngineSettings,
}

impl<S, C, G> ResolutionEngine<S, C, G, SystemClock>
where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
{
    /// Creates an engine with default settings that reads the system clock.
    pub fn new(store: S, cache: FailOpenCache<C>, generator: G) -> Self {
        Self {
            store: Arc::new(store),
            cache,
            generator,
            clock: SystemClock,
            settings: EngineSettings::default(),
        }
    }
}

impl<S, C, G, K> ResolutionEngine<S, C, G, K>
where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
    K: Clock,
{
    /// Replaces the allocation settings.
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the clock used to stamp creations and compute sweep cutoffs.
    pub fn with_clock<K2: Clock>(self, clock: K2) -> ResolutionEngine<S, C, G, K2> {
        ResolutionEngine {
            store: self.store,
            cache: self.cache,
            generator: self.generator,
            clock,
            settings: self.settings,
        }
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &FailOpenCache<C> {
        &self.cache
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the mapping for `long_url`, allocating a new code if needed.
    ///
    /// The URL is trimmed and given an `https://` scheme when it has neither
    /// `http://` nor `https://`. An existing mapping for the exact normalized
    /// URL is returned as is, without a write.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidInput`] for a missing, blank or too long URL
    /// * [`EngineError::CodeGenerationExhausted`] if every candidate code was taken
    /// * [`EngineError::Backend`] if the store fails
    pub async fn create<'a>(&self, long_url: impl Into<Option<&'a str>>) -> Result<Mapping> {
        let Some(raw) = non_blank(long_url.into()) else {
            return Err(EngineError::InvalidInput(
                "long URL must not be blank".to_string(),
            ));
        };

        let normalized = normalize_url(raw);
        let length = normalized.chars().count();
        if length > self.settings.max_url_length {
            return Err(EngineError::InvalidInput(format!(
                "long URL is {} characters, the limit is {}",
                length, self.settings.max_url_length
            )));
        }

        if let Some(existing) = self.store.find_by_url(&normalized).await? {
            info!(
                target: AUDIT_TARGET,
                code = %existing.short_code,
                url = %existing.long_url,
                "Reusing existing short code"
            );
            return Ok(existing);
        }

        let attempts = self.settings.max_attempts;
        for attempt in 1..=attempts {
            let candidate: ShortCode = self.generator.generate().into();
            trace!(code = %candidate, attempt, "Trying candidate short code");

            if self.store.exists_by_code(&candidate).await? {
                debug!(code = %candidate, attempt, "Short code collision");
                continue;
            }

            let new_mapping =
                NewMapping::new(normalized.as_str(), candidate).with_created_at(self.clock.now());

            match self.store.save(new_mapping).await {
                Ok(saved) => {
                    self.cache.set(&saved.short_code, &saved.long_url).await;
                    info!(
                        target: AUDIT_TARGET,
                        code = %saved.short_code,
                        url = %saved.long_url,
                        id = %saved.id,
                        "Created short URL"
                    );
                    return Ok(saved);
                }
                Err(StorageError::Conflict(code)) => {
                    debug!(code = %code, attempt, "Short code taken concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(
            attempts,
            url = %normalized,
            "Failed to generate a unique short code"
        );
        Err(EngineError::CodeGenerationExhausted { attempts })
    }

    /// Returns the long URL behind `code`.
    ///
    /// The cache is consulted first; a hit never touches the store. On a
    /// miss the store answers and the result is written back to the cache.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidInput`] for a missing or blank code
    /// * [`EngineError::NotFound`] if no mapping has this code
    /// * [`EngineError::Backend`] if the store fails
    pub async fn resolve<'a>(&self, code: impl Into<Option<&'a str>>) -> Result<String> {
        let Some(raw) = non_blank(code.into()) else {
            return Err(EngineError::InvalidInput(
                "short code must not be blank".to_string(),
            ));
        };
        let code = ShortCode::new_unchecked(raw);

        if let Some(url) = self.cache.get(&code).await {
            info!(target: AUDIT_TARGET, code = %code, source = "cache", "Resolved short code");
            return Ok(url);
        }

        match self.store.find_by_code(&code).await? {
            Some(mapping) => {
                self.cache.set(&code, &mapping.long_url).await;
                info!(target: AUDIT_TARGET, code = %code, source = "store", "Resolved short code");
                Ok(mapping.long_url)
            }
            None => {
                warn!(target: AUDIT_TARGET, code = %code, "Short code not found");
                Err(EngineError::NotFound(code.to_string()))
            }
        }
    }

    /// Deletes every mapping created strictly before `cutoff` and evicts
    /// their codes from the cache. Returns the number of rows deleted.
    ///
    /// A missing cutoff deletes nothing and returns `0`. The evicted codes
    /// are the ones listed before the bulk delete ran.
    pub async fn expire_older_than(&self, cutoff: impl Into<Option<Timestamp>>) -> Result<u64> {
        let Some(cutoff) = cutoff.into() else {
            debug!("No cutoff given, nothing to expire");
            return Ok(0);
        };

        let expired = self.store.find_created_before(cutoff).await?;
        let deleted = self.store.delete_created_before(cutoff).await?;

        for mapping in &expired {
            self.cache.evict(&mapping.short_code).await;
        }

        info!(
            target: AUDIT_TARGET,
            cutoff = %cutoff,
            deleted,
            evicted = expired.len(),
            "Expired old mappings"
        );
        Ok(deleted)
    }

    /// Looks up the full mapping for `code` in the store. Blank codes yield `None`.
    pub async fn mapping<'a>(&self, code: impl Into<Option<&'a str>>) -> Result<Option<Mapping>> {
        let Some(raw) = non_blank(code.into()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_by_code(&ShortCode::new_unchecked(raw))
            .await?)
    }

    pub async fn code_exists<'a>(&self, code: impl Into<Option<&'a str>>) -> Result<bool> {
        let Some(raw) = non_blank(code.into()) else {
            return Ok(false);
        };
        Ok(self
            .store
            .exists_by_code(&ShortCode::new_unchecked(raw))
            .await?)
    }

    /// Total number of stored mappings.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count().await?)
    }

    /// Drops `code` from the cache. Blank codes are ignored.
    pub async fn evict<'a>(&self, code: impl Into<Option<&'a str>>) {
        if let Some(raw) = non_blank(code.into()) {
            self.cache.evict(&ShortCode::new_unchecked(raw)).await;
        }
    }

    pub async fn cache_available(&self) -> bool {
        self.cache.is_available().await
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine_with, RecordingCache, RecordingStore, ScriptedGenerator};
    use jiff::SignedDuration;
    use tinylink_cache::testing::{BrokenCache, HangingCache};
    use tinylink_cache::CacheSettings;
    use tinylink_core::ManualClock;
    use tinylink_generator::RandomGenerator;
    use tinylink_storage::InMemoryStore;

    fn recording_engine(
        generator: ScriptedGenerator,
    ) -> ResolutionEngine<RecordingStore, RecordingCache, ScriptedGenerator> {
        engine_with(RecordingStore::new(), RecordingCache::new(), generator)
    }

    #[tokio::test]
    async fn create_is_idempotent_for_the_same_url() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa", "bbbbbb"]));

        let first = engine.create("https://example.com/page").await.unwrap();
        let second = engine.create("https://example.com/page").await.unwrap();

        assert_eq!(first.short_code, second.short_code);
        assert_eq!(first.id, second.id);
        assert_eq!(engine.store().calls("save"), 1);
    }

    #[tokio::test]
    async fn create_dedups_after_normalization() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa", "bbbbbb"]));

        let first = engine.create("example.com/x").await.unwrap();
        let second = engine.create("  https://example.com/x  ").await.unwrap();

        assert_eq!(first.short_code, second.short_code);
        assert_eq!(engine.store().calls("save"), 1);
    }

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let engine = engine_with(
            InMemoryStore::new(),
            RecordingCache::new(),
            RandomGenerator::new(),
        );

        for input in ["example.com/a", "http://example.com/b", "HTTPS://Example.com/C"] {
            let mapping = engine.create(input).await.unwrap();
            let url = engine.resolve(mapping.short_code.as_str()).await.unwrap();
            assert_eq!(url, normalize_url(input));
        }
    }

    #[tokio::test]
    async fn create_normalizes_scheme() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa", "bbbbbb"]));

        let bare = engine.create("example.com/x").await.unwrap();
        assert_eq!(bare.long_url, "https://example.com/x");

        let upper = engine.create("HTTP://Example.com").await.unwrap();
        assert_eq!(upper.long_url, "HTTP://Example.com");
    }

    #[tokio::test]
    async fn create_populates_the_cache() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa"]));

        let mapping = engine.create("https://example.com").await.unwrap();

        assert_eq!(engine.cache().inner().calls("set"), 1);
        assert_eq!(
            engine.cache().inner().peek(&mapping.short_code).await.as_deref(),
            Some("https://example.com")
        );
    }

    #[tokio::test]
    async fn create_stamps_time_from_the_clock() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let engine = engine_with(
            InMemoryStore::new(),
            RecordingCache::new(),
            ScriptedGenerator::new(["aaaaaa"]),
        )
        .with_clock(ManualClock::new(now));

        let mapping = engine.create("https://example.com").await.unwrap();
        assert_eq!(mapping.created_at, now);
    }

    #[tokio::test]
    async fn create_uses_fifth_candidate_after_four_collisions() {
        let engine = recording_engine(ScriptedGenerator::new([
            "taken1", "taken2", "taken3", "taken4", "free05",
        ]));
        engine.store().script_exists([true, true, true, true, false]);

        let mapping = engine.create("https://example.com").await.unwrap();

        assert_eq!(mapping.short_code.as_str(), "free05");
        assert_eq!(engine.store().calls("exists_by_code"), 5);
        assert_eq!(engine.store().calls("save"), 1);
    }

    #[tokio::test]
    async fn create_gives_up_after_five_collisions() {
        let engine = recording_engine(ScriptedGenerator::new([
            "taken1", "taken2", "taken3", "taken4", "taken5", "spare6",
        ]));
        engine.store().script_exists([true; 6]);

        let err = engine.create("https://example.com").await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::CodeGenerationExhausted { attempts: 5 }
        ));
        assert!(err.is_server_error());
        assert_eq!(engine.store().calls("exists_by_code"), 5);
        assert_eq!(engine.store().calls("save"), 0);
        assert_eq!(engine.cache().inner().calls("set"), 0);
    }

    #[tokio::test]
    async fn save_conflict_consumes_an_attempt() {
        let engine = recording_engine(ScriptedGenerator::new(["raced1", "winner"]));
        engine.store().script_save_conflicts(1);

        let mapping = engine.create("https://example.com").await.unwrap();

        assert_eq!(mapping.short_code.as_str(), "winner");
        assert_eq!(engine.store().calls("save"), 2);
    }

    #[tokio::test]
    async fn create_gives_up_after_five_save_conflicts() {
        let engine = recording_engine(ScriptedGenerator::new([]));
        engine.store().script_save_conflicts(5);

        let err = engine.create("https://example.com").await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::CodeGenerationExhausted { attempts: 5 }
        ));
        assert_eq!(engine.store().calls("exists_by_code"), 5);
        assert_eq!(engine.store().calls("save"), 5);
        assert_eq!(engine.cache().inner().calls("set"), 0);
        assert_eq!(engine.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collisions_and_save_conflicts_share_the_attempt_budget() {
        let engine = recording_engine(ScriptedGenerator::new([]));
        engine.store().script_exists([true, true]);
        engine.store().script_save_conflicts(3);

        let err = engine.create("https://example.com").await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::CodeGenerationExhausted { attempts: 5 }
        ));
        assert_eq!(engine.store().calls("exists_by_code"), 5);
        assert_eq!(engine.store().calls("save"), 3);
        assert_eq!(engine.cache().inner().calls("set"), 0);
        assert_eq!(engine.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn attempt_budget_is_configurable() {
        let engine = recording_engine(ScriptedGenerator::new(["taken1", "taken2"]))
            .with_settings(EngineSettings::builder().max_attempts(2).build());
        engine.store().script_exists([true, true]);

        let err = engine.create("https://example.com").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::CodeGenerationExhausted { attempts: 2 }
        ));
    }

    #[tokio::test]
    async fn blank_or_missing_url_is_rejected_before_any_io() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa"]));

        for input in [Some(""), Some("   "), None] {
            let err = engine.create(input).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
            assert!(err.is_client_error());
        }

        assert_eq!(engine.store().total_calls(), 0);
        assert_eq!(engine.cache().inner().total_calls(), 0);
    }

    #[tokio::test]
    async fn url_length_is_checked_after_normalization() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa"]));

        // 2040 chars + "https://" = 2048, exactly at the limit.
        let at_limit = "a".repeat(2040);
        engine.create(at_limit.as_str()).await.unwrap();

        let over_limit = "b".repeat(2041);
        let err = engine.create(over_limit.as_str()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn resolve_miss_reads_store_and_fills_cache_once() {
        let engine = recording_engine(ScriptedGenerator::new([]));
        engine
            .store()
            .insert(NewMapping::new("https://example.com", ShortCode::new_unchecked("abc123")))
            .await;

        let url = engine.resolve("abc123").await.unwrap();

        assert_eq!(url, "https://example.com");
        assert_eq!(engine.store().calls("find_by_code"), 1);
        assert_eq!(engine.cache().inner().calls("set"), 1);

        // Second lookup is served by the cache.
        let again = engine.resolve("abc123").await.unwrap();
        assert_eq!(again, "https://example.com");
        assert_eq!(engine.store().calls("find_by_code"), 1);
        assert_eq!(engine.cache().inner().calls("set"), 1);
    }

    #[tokio::test]
    async fn resolve_hit_makes_no_store_calls() {
        let engine = recording_engine(ScriptedGenerator::new([]));
        engine
            .cache()
            .inner()
            .prime(&ShortCode::new_unchecked("cached"), "https://cached.example")
            .await;

        let url = engine.resolve("  cached ").await.unwrap();

        assert_eq!(url, "https://cached.example");
        assert_eq!(engine.store().total_calls(), 0);
    }

    #[tokio::test]
    async fn resolve_unknown_code_is_not_found() {
        let engine = recording_engine(ScriptedGenerator::new([]));

        let err = engine.resolve("nope00").await.unwrap_err();

        assert!(matches!(err, EngineError::NotFound(ref code) if code == "nope00"));
        assert_eq!(engine.cache().inner().calls("set"), 0);
    }

    #[tokio::test]
    async fn resolve_rejects_blank_code() {
        let engine = recording_engine(ScriptedGenerator::new([]));

        for input in [Some(""), Some(" \t "), None] {
            let err = engine.resolve(input).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
        }
        assert_eq!(engine.store().total_calls(), 0);
        assert_eq!(engine.cache().inner().total_calls(), 0);
    }

    #[tokio::test]
    async fn expire_older_than_deletes_and_evicts_enumerated_codes() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let engine = recording_engine(ScriptedGenerator::new([]));
        let store = engine.store();
        let cache = engine.cache().inner();

        let old = ShortCode::new_unchecked("old001");
        let young = ShortCode::new_unchecked("new001");
        store
            .insert(
                NewMapping::new("https://old.example", old.clone())
                    .with_created_at(now - SignedDuration::from_hours(40 * 24)),
            )
            .await;
        store
            .insert(
                NewMapping::new("https://new.example", young.clone())
                    .with_created_at(now - SignedDuration::from_hours(10 * 24)),
            )
            .await;
        cache.prime(&old, "https://old.example").await;
        cache.prime(&young, "https://new.example").await;

        let cutoff = now - SignedDuration::from_hours(30 * 24);
        let deleted = engine.expire_older_than(cutoff).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(cache.calls("del"), 1);
        assert!(cache.peek(&old).await.is_none());
        assert!(cache.peek(&young).await.is_some());
        assert!(engine.mapping("new001").await.unwrap().is_some());
        assert!(engine.mapping("old001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expire_without_cutoff_is_a_no_op() {
        let engine = recording_engine(ScriptedGenerator::new([]));

        assert_eq!(engine.expire_older_than(None::<Timestamp>).await.unwrap(), 0);
        assert_eq!(engine.store().total_calls(), 0);
    }

    #[tokio::test]
    async fn broken_cache_never_fails_operations() {
        let engine = engine_with(
            InMemoryStore::new(),
            BrokenCache,
            ScriptedGenerator::new(["aaaaaa"]),
        );

        let mapping = engine.create("https://example.com").await.unwrap();
        let url = engine.resolve(mapping.short_code.as_str()).await.unwrap();
        assert_eq!(url, "https://example.com");
        engine.evict(mapping.short_code.as_str()).await;

        assert!(!engine.cache_available().await);
    }

    #[tokio::test]
    async fn hanging_cache_is_bounded_by_the_timeout() {
        let cache = FailOpenCache::new(
            HangingCache,
            CacheSettings::builder()
                .op_timeout(std::time::Duration::from_millis(20))
                .build(),
        );
        let engine = ResolutionEngine::new(
            InMemoryStore::new(),
            cache,
            ScriptedGenerator::new(["aaaaaa"]),
        );

        let mapping = engine.create("https://example.com").await.unwrap();
        let url = engine.resolve(mapping.short_code.as_str()).await.unwrap();
        assert_eq!(url, "https://example.com");
        assert!(!engine.cache_available().await);
    }

    #[tokio::test]
    async fn store_failures_surface_as_backend_errors() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa"]));
        engine.store().fail_with(StorageError::Unavailable("db down".into()));

        let err = engine.create("https://example.com").await.unwrap_err();
        assert!(matches!(err, EngineError::Backend(StorageError::Unavailable(_))));

        let err = engine.resolve("abc123").await.unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn lookup_helpers_treat_blank_codes_as_absent() {
        let engine = recording_engine(ScriptedGenerator::new(["aaaaaa"]));
        let mapping = engine.create("https://example.com").await.unwrap();

        assert_eq!(engine.mapping(" ").await.unwrap(), None);
        assert!(!engine.code_exists(None::<&str>).await.unwrap());
        engine.evict("").await;
        assert_eq!(engine.cache().inner().calls("del"), 0);

        assert_eq!(
            engine.mapping(mapping.short_code.as_str()).await.unwrap(),
            Some(mapping.clone())
        );
        assert!(engine.code_exists(mapping.short_code.as_str()).await.unwrap());
        assert_eq!(engine.count().await.unwrap(), 1);

        engine.evict(mapping.short_code.as_str()).await;
        assert!(engine.cache().inner().peek(&mapping.short_code).await.is_none());
        assert!(engine.cache_available().await);
    }
}
