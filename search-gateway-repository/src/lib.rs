//! # Search Gateway Repository
//!
//! This crate provides traits and implementations for interacting with the
//! search backends. It includes definitions for errors, interfaces, the
//! document preparation shared by both backends, a Meilisearch client, an
//! OpenSearch implementation of the legacy engine, and the per-index engines
//! that combine them.

pub mod documents;
pub mod engine;
pub mod errors;
pub mod interfaces;
pub mod meilisearch;
pub mod opensearch;
pub mod types;

pub use documents::{id_to_primary_key, DocumentEncoder, FieldSelection};
pub use engine::{DualWriteEngine, EngineKind, LegacyEngine};
pub use errors::{Backend, SearchError};
pub use interfaces::{ExternalIndexClient, LegacySearchEngine, SearchEngine};
pub use meilisearch::{
    IndexFacetConfig, MeilisearchClient, TenantTokenSigner, TokenIssuer, TokenSettings, UserToken,
};
pub use opensearch::OpenSearchLegacyEngine;
pub use types::{
    ApiKey, ApiKeyRequest, BatchOperationResult, BatchOperationSummary, IndexSettings, TaskReceipt,
};
