//! Document identity mapping.
//!
//! Record ids are typically course or block keys such as
//! `course-v1:OpenedX+DemoX+DemoCourse`. Meilisearch primary keys only accept
//! alphanumerics, `-` and `_`, so the physical key is the SHA-1 hex digest of
//! the id.

use sha1::{Digest, Sha1};

/// Derive the Meilisearch primary key for a record id.
///
/// Returns 40 lowercase hex characters.
pub fn id_to_primary_key(id: &str) -> String {
    hex::encode(Sha1::digest(id.as_bytes()))
}
