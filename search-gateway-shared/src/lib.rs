//! # Search Gateway Shared
//!
//! Data types shared between the search gateway crates: the source records
//! handed to the indexers, the legacy search request, and the raw and
//! normalized result envelopes.

mod record;
mod request;
mod response;

pub use record::{DateTimeValue, FieldValue, RecordError, SourceRecord, SourceRecordBuilder};
pub use record::{ID_FIELD, PRIMARY_KEY_FIELD};
pub use request::{FilterValue, IndexParams, SearchRequest};
pub use response::{
    Aggregation, NormalizedHit, NormalizedResponse, RawHit, RawSearchResponse, DOCUMENT_TYPE,
};
