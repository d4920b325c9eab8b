//! Search error types.
//!
//! This module defines the error types that can occur while indexing into or
//! querying the search backends.

use std::fmt;

use search_gateway_shared::RecordError;
use thiserror::Error;

/// The search backend an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// The Meilisearch cluster.
    Meilisearch,
    /// The Elasticsearch-compatible legacy engine.
    OpenSearch,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Meilisearch => f.write_str("meilisearch"),
            Backend::OpenSearch => f.write_str("opensearch"),
        }
    }
}

/// Errors that can occur during search engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Failed to establish connection to a search engine.
    #[error("Connection error ({backend}): {message}")]
    ConnectionError { backend: Backend, message: String },

    /// A record value cannot be represented on the wire.
    #[error("Serialization error at {path}: {reason}")]
    SerializationError { path: String, reason: String },

    /// A backend rejected or failed an indexing call.
    #[error("Upstream write error ({backend}): {message}")]
    UpstreamWriteError { backend: Backend, message: String },

    /// Search query execution failed.
    #[error("Query error ({backend}): {message}")]
    QueryError { backend: Backend, message: String },

    /// A backend response is missing a field the gateway depends on.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Failed to create or configure an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse a response from a search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The request itself is invalid.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(backend: Backend, msg: impl Into<String>) -> Self {
        Self::ConnectionError {
            backend,
            message: msg.into(),
        }
    }

    /// Create a serialization error for the value at `path`.
    pub fn serialization(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SerializationError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an upstream write error.
    pub fn upstream_write(backend: Backend, msg: impl Into<String>) -> Self {
        Self::UpstreamWriteError {
            backend,
            message: msg.into(),
        }
    }

    /// Create a query error.
    pub fn query(backend: Backend, msg: impl Into<String>) -> Self {
        Self::QueryError {
            backend,
            message: msg.into(),
        }
    }

    /// Create a contract violation error.
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// The backend this error came from, if any.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Self::ConnectionError { backend, .. }
            | Self::UpstreamWriteError { backend, .. }
            | Self::QueryError { backend, .. } => Some(*backend),
            _ => None,
        }
    }
}

impl From<RecordError> for SearchError {
    fn from(err: RecordError) -> Self {
        Self::ValidationError(err.to_string())
    }
}
