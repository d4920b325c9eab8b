//! # Search Gateway
//!
//! Configuration and wiring for the search gateway.
//!
//! This crate loads [`GatewayConfig`] from the environment and builds the
//! per-index search engines, the tenant token issuer and the index
//! provisioning used by the `search-gateway` binary.

pub mod config;
pub mod loader;

pub use config::{Dependencies, GatewayConfig, MeilisearchHandles};
pub use loader::{LoaderConfig, RecordLoader};

use thiserror::Error;

/// Errors that can occur during gateway initialization or execution.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] search_gateway_repository::SearchError),

    /// A line of a record file could not be turned into a record.
    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            reason: reason.into(),
        }
    }
}
