use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tinylink_engine::MaintenanceSettings;
use tinylink_telemetry::LogFormat;

pub const LOG_FORMAT_ENV: &str = "TINYLINK_LOG_FORMAT";
pub const STORAGE_BACKEND_ENV: &str = "TINYLINK_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "TINYLINK_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "TINYLINK_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "TINYLINK_REDIS_URL";
pub const CACHE_TTL_ENV: &str = "TINYLINK_CACHE_TTL_SECS";
pub const CACHE_TIMEOUT_ENV: &str = "TINYLINK_CACHE_TIMEOUT_MS";
pub const CACHE_CAPACITY_ENV: &str = "TINYLINK_CACHE_CAPACITY";
pub const BASE_URL_ENV: &str = "TINYLINK_BASE_URL";
pub const RETENTION_DAYS_ENV: &str = "TINYLINK_RETENTION_DAYS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "none")]
    None,
    #[value(name = "memory")]
    Memory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::None => write!(f, "none"),
            CacheBackendArg::Memory => write!(f, "memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tinylink", version, about = "Allocate and resolve short URL codes")]
pub struct CLI {
    #[arg(long, global = true, env = LOG_FORMAT_ENV, default_value = "text")]
    pub log_format: LogFormat,

    #[arg(
        long,
        global = true,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, global = true, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        global = true,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Memory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, global = true, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    /// Lifetime of cached entries, in seconds.
    #[arg(long, global = true, env = CACHE_TTL_ENV, default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Upper bound on a single cache call, in milliseconds.
    #[arg(long, global = true, env = CACHE_TIMEOUT_ENV, default_value_t = 500)]
    pub cache_timeout_ms: u64,

    /// Maximum number of entries kept by the in-process cache.
    #[arg(long, global = true, env = CACHE_CAPACITY_ENV, default_value_t = 10_000)]
    pub cache_capacity: u64,

    /// Public prefix of generated short URLs.
    #[arg(long, global = true, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a long URL, reusing an existing code for the same URL.
    Shorten { url: String },
    /// Print the long URL behind a short code.
    Resolve { code: String },
    /// Delete mappings older than the retention period.
    Sweep {
        #[arg(long, env = RETENTION_DAYS_ENV, default_value_t = 30)]
        retention_days: u32,
    },
    /// Print mapping count and cache health.
    Stats,
    /// Run scheduled maintenance until interrupted.
    Maintain(MaintainArgs),
}

impl Command {
    /// Whether the command only makes sense against mappings from earlier runs.
    pub fn reads_existing_mappings(&self) -> bool {
        matches!(self, Self::Resolve { .. } | Self::Sweep { .. } | Self::Stats)
    }
}

impl CLI {
    /// One-shot commands on the in-memory store always start from an empty store.
    pub fn starts_from_empty_store(&self) -> bool {
        self.storage == StorageBackendArg::InMemory && self.command.reads_existing_mappings()
    }
}

#[derive(Debug, Args)]
pub struct MaintainArgs {
    #[arg(long, env = RETENTION_DAYS_ENV, default_value_t = 30)]
    pub retention_days: u32,

    #[arg(long, default_value_t = 24 * 60 * 60)]
    pub cleanup_interval_secs: u64,

    #[arg(long, default_value_t = 60 * 60)]
    pub statistics_interval_secs: u64,

    #[arg(long, default_value_t = 30 * 60)]
    pub health_check_interval_secs: u64,

    #[arg(long)]
    pub no_cleanup: bool,

    #[arg(long)]
    pub no_statistics: bool,
}

impl MaintainArgs {
    pub fn settings(&self) -> MaintenanceSettings {
        MaintenanceSettings::builder()
            .retention_days(self.retention_days)
            .cleanup_enabled(!self.no_cleanup)
            .statistics_enabled(!self.no_statistics)
            .cleanup_interval(Duration::from_secs(self.cleanup_interval_secs))
            .statistics_interval(Duration::from_secs(self.statistics_interval_secs))
            .health_check_interval(Duration::from_secs(self.health_check_interval_secs))
            .build()
    }
}
