//! Per-index search engines.
//!
//! Which engine serves an index is decided once at startup from
//! [`EngineKind`]:
//!
//! - [`DualWriteEngine`]: writes to Meilisearch and the legacy engine,
//!   searches Meilisearch
//! - [`LegacyEngine`]: the legacy engine alone

mod dual_write;
mod legacy;

use std::fmt;
use std::str::FromStr;

pub use dual_write::DualWriteEngine;
pub use legacy::LegacyEngine;

use crate::errors::SearchError;
use search_gateway_shared::SourceRecord;

/// Engine variant selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineKind {
    #[default]
    Meilisearch,
    Legacy,
}

impl FromStr for EngineKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meilisearch" => Ok(Self::Meilisearch),
            "legacy" | "elasticsearch" | "opensearch" => Ok(Self::Legacy),
            other => Err(SearchError::validation(format!(
                "unknown search engine: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meilisearch => write!(f, "meilisearch"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

fn ensure_batch(records: &[SourceRecord]) -> Result<(), SearchError> {
    if records.is_empty() {
        return Err(SearchError::validation("cannot index an empty batch"));
    }
    Ok(())
}
