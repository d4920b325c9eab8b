//! Source records handed to the indexers.
//!
//! A record is a mapping from field name to [`FieldValue`]. Every record has
//! an `id` string, the join key shared by both search backends.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Name of the mandatory identifier field.
pub const ID_FIELD: &str = "id";

/// Field under which the derived Meilisearch primary key is stored.
///
/// Callers may not use this name for their own data.
pub const PRIMARY_KEY_FIELD: &str = "_pk";

/// Errors raised while building a [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// The record has no `id` field.
    #[error("record is missing the \"id\" field")]
    MissingId,

    /// The `id` field is present but is not a non-empty string.
    #[error("record \"id\" must be a non-empty string")]
    InvalidId,

    /// The record uses a field name reserved by the gateway.
    #[error("field \"{0}\" is reserved")]
    ReservedField(String),

    /// A JSON value could not be turned into a record.
    #[error("record must be a JSON object")]
    NotAnObject,
}

/// A date/time value, with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    /// Timezone-naive value.
    Naive(NaiveDateTime),
    /// Value carrying a fixed UTC offset.
    Offset(DateTime<FixedOffset>),
}

/// A single value stored in a source record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    String(String),
    DateTime(DateTimeValue),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Return the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInt(u)
                } else {
                    // Neither integer form fits, so serde_json holds it as an f64.
                    n.as_f64().map_or(FieldValue::Null, FieldValue::Float)
                }
            }
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(FieldValue::UInt(value), FieldValue::Int)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(DateTimeValue::Naive(value))
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(DateTimeValue::Offset(value))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(DateTimeValue::Offset(value.fixed_offset()))
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// A document to be indexed, keyed by its `id` field.
///
/// Records are immutable once built. Indexers that need to add fields work on
/// their own encoded copy.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl SourceRecord {
    /// Start building a record with the given id.
    pub fn builder(id: impl Into<String>) -> SourceRecordBuilder {
        SourceRecordBuilder::new(id)
    }

    /// Build a record from a complete field map.
    pub fn try_from_fields(fields: BTreeMap<String, FieldValue>) -> Result<Self, RecordError> {
        match fields.get(ID_FIELD) {
            None => return Err(RecordError::MissingId),
            Some(FieldValue::String(id)) if !id.is_empty() => {}
            Some(_) => return Err(RecordError::InvalidId),
        }
        if fields.contains_key(PRIMARY_KEY_FIELD) {
            return Err(RecordError::ReservedField(PRIMARY_KEY_FIELD.to_string()));
        }
        Ok(Self { fields })
    }

    /// The record's opaque identifier.
    pub fn id(&self) -> &str {
        self.fields
            .get(ID_FIELD)
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
    }

    /// Look up a single field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// All fields, including `id`.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Number of fields, including `id`.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a valid record; provided for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Value> for SourceRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => {
                Self::try_from_fields(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            _ => Err(RecordError::NotAnObject),
        }
    }
}

/// Builder for [`SourceRecord`].
#[derive(Debug, Clone)]
pub struct SourceRecordBuilder {
    fields: BTreeMap<String, FieldValue>,
}

impl SourceRecordBuilder {
    fn new(id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(ID_FIELD.to_string(), FieldValue::String(id.into()));
        Self { fields }
    }

    /// Set a field. Setting `id` again replaces the identifier.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Validate and build the record.
    pub fn build(self) -> Result<SourceRecord, RecordError> {
        SourceRecord::try_from_fields(self.fields)
    }
}
