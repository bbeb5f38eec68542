use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Store-assigned identifier of a [`Mapping`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingId(u64);

impl MappingId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for MappingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted association between a long URL and its short code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Identifier assigned by the store on save.
    pub id: MappingId,
    /// The normalized, protocol-qualified URL.
    pub long_url: String,
    /// The unique public code.
    pub short_code: ShortCode,
    /// When the mapping was created.
    pub created_at: Timestamp,
}

/// A mapping that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMapping {
    pub long_url: String,
    pub short_code: ShortCode,
    /// Creation time; the store stamps the current time when `None`.
    pub created_at: Option<Timestamp>,
}

impl NewMapping {
    pub fn new(long_url: impl Into<String>, short_code: ShortCode) -> Self {
        Self {
            long_url: long_url.into(),
            short_code,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Turns this into a saved [`Mapping`] with the given id.
    pub fn into_mapping(self, id: MappingId) -> Mapping {
        Mapping {
            id,
            long_url: self.long_url,
            short_code: self.short_code,
            created_at: self.created_at.unwrap_or_else(Timestamp::now),
        }
    }
}
