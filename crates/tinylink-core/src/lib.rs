//! Core types and traits for the tinylink URL shortener.
//!
//! This crate holds the pieces shared by every other crate in the
//! workspace: the [`ShortCode`] identifier, the [`Mapping`] entity, the
//! durable store contract, the error taxonomy, and the clock abstraction.

pub mod clock;
pub mod error;
pub mod mapping;
pub mod shortcode;
pub mod store;
pub mod url;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, EngineError, StorageError};
pub use mapping::{Mapping, MappingId, NewMapping};
pub use shortcode::ShortCode;
pub use store::{MappingStore, ReadMappingStore};
pub use url::{normalize_url, MAX_URL_LENGTH};
