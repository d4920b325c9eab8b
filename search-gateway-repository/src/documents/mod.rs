//! Preparing source records for the search backends.
//!
//! - `identity`: derives Meilisearch-safe primary keys from record ids
//! - `encoder`: turns records into JSON documents

mod encoder;
mod identity;

pub use encoder::{format_datetime, DateStyle, DocumentEncoder, FieldSelection};
pub use identity::id_to_primary_key;
