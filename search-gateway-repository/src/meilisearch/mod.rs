//! Meilisearch implementation of the external search engine client.
//!
//! Besides the client itself this module holds the Meilisearch-specific
//! pieces of the gateway: facet reconciliation, result normalization and
//! tenant tokens.

mod client;
mod facets;
mod normalize;
mod tokens;

pub use client::MeilisearchClient;
pub use facets::{reconcile_facets, IndexFacetConfig};
pub use normalize::process_results;
pub use tokens::{
    compose_search_rules, TenantTokenSigner, TokenIssuer, TokenSettings, UserToken,
    SEARCH_ENGINE_NAME,
};
