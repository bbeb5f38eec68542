mod cli;

use crate::cli::{CacheBackendArg, Command, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tinylink_cache::{
    CacheSettings, FailOpenCache, MokaUrlCache, NoopCache, RedisUrlCache, UrlCache,
};
use tinylink_core::MappingStore;
use tinylink_engine::{
    Maintenance, MaintenanceScheduler, MaintenanceSettings, ResolutionEngine, RetentionSweeper,
};
use tinylink_generator::RandomGenerator;
use tinylink_storage::{InMemoryStore, MySqlStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    tinylink_telemetry::init(config.log_format)?;

    info!(
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        "starting tinylink"
    );
    if config.starts_from_empty_store() {
        warn!("in-memory storage does not persist between runs, use --storage mysql to keep mappings");
    }

    let cache = FailOpenCache::new(
        build_cache(&config).await,
        CacheSettings::builder()
            .ttl(Duration::from_secs(config.cache_ttl_secs))
            .op_timeout(Duration::from_millis(config.cache_timeout_ms))
            .build(),
    );

    match config.storage {
        StorageBackendArg::InMemory => run(&config, InMemoryStore::new(), cache).await,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(mysql_dsn)
                .await
                .context("failed to connect to MySQL")?;
            store
                .ensure_schema()
                .await
                .context("failed to create MySQL schema")?;
            run(&config, store, cache).await
        }
    }
}

/// Selects the cache backend. An unreachable Redis degrades to no caching.
async fn build_cache(config: &CLI) -> Box<dyn UrlCache> {
    match config.cache {
        CacheBackendArg::None => Box::new(NoopCache),
        CacheBackendArg::Memory => Box::new(MokaUrlCache::with_capacity(config.cache_capacity)),
        CacheBackendArg::Redis => {
            let Some(redis_url) = config.redis_url.as_deref() else {
                warn!("no redis url configured, running without a cache");
                return Box::new(NoopCache);
            };
            match RedisUrlCache::connect(redis_url).await {
                Ok(cache) => Box::new(cache),
                Err(e) => {
                    warn!(error = %e, "Redis is unavailable, running without a cache");
                    Box::new(NoopCache)
                }
            }
        }
    }
}

async fn run<S: MappingStore>(
    config: &CLI,
    store: S,
    cache: FailOpenCache<Box<dyn UrlCache>>,
) -> anyhow::Result<()> {
    let engine = Arc::new(ResolutionEngine::new(store, cache, RandomGenerator::new()));

    match &config.command {
        Command::Shorten { url } => {
            let mapping = engine.create(url.as_str()).await?;
            println!("{}", mapping.short_code.to_url(&config.base_url));
        }
        Command::Resolve { code } => {
            println!("{}", engine.resolve(code.as_str()).await?);
        }
        Command::Sweep { retention_days } => {
            let deleted = RetentionSweeper::new(engine).sweep(*retention_days).await?;
            println!("deleted {deleted} mapping(s)");
        }
        Command::Stats => {
            let stats = Maintenance::new(engine, MaintenanceSettings::default())
                .collect_statistics()
                .await?;
            println!("total mappings:  {}", stats.total_mappings);
            println!("cache available: {}", stats.cache_available);
            println!("collected at:    {}", stats.collected_at);
        }
        Command::Maintain(args) => {
            let scheduler = MaintenanceScheduler::start(Maintenance::new(engine, args.settings()));
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            info!("received Ctrl-C, shutting down");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
