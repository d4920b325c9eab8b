//! Error types for the search gateway repository.

mod search_error;

pub use search_error::{Backend, SearchError};
