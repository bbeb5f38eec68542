//! The URL resolution engine and its scheduled maintenance.
//!
//! [`ResolutionEngine`] turns long URLs into short codes and back, keeping
//! a durable store authoritative and a fail-open cache in front of it.
//! [`RetentionSweeper`] and [`Maintenance`] drive periodic cleanup.

pub mod engine;
pub mod maintenance;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use engine::{EngineSettings, ResolutionEngine, AUDIT_TARGET};
pub use maintenance::{
    Maintenance, MaintenanceScheduler, MaintenanceSettings, Statistics, STATS_TARGET,
};
pub use sweeper::RetentionSweeper;
pub use tinylink_core::EngineError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
