//! Record to JSON document encoding.
//!
//! JSON has no date type, so date/time values are written as strings. The
//! Meilisearch side uses the plain `YYYY-MM-DD HH:MM:SS[+HH:MM]` form; the
//! legacy engine receives ISO-8601.

use chrono::Timelike;
use serde_json::{Map, Number, Value};

use crate::errors::SearchError;
use search_gateway_shared::{DateTimeValue, FieldValue, SourceRecord, ID_FIELD};

/// How date/time values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// `2024-12-31 05:00:00+00:00`
    #[default]
    Plain,
    /// `2024-12-31T05:00:00+00:00`
    Iso8601,
}

/// Which top-level fields of a record end up in the document.
///
/// The `id` field is always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldSelection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl FieldSelection {
    fn keeps(&self, name: &str) -> bool {
        if name == ID_FIELD {
            return true;
        }
        match self {
            FieldSelection::All => true,
            FieldSelection::Include(fields) => fields.iter().any(|f| f == name),
            FieldSelection::Exclude(fields) => !fields.iter().any(|f| f == name),
        }
    }
}

/// Turns [`SourceRecord`]s into JSON documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentEncoder {
    date_style: DateStyle,
    selection: FieldSelection,
}

impl DocumentEncoder {
    /// Create an encoder that keeps every field.
    pub fn new(date_style: DateStyle) -> Self {
        Self {
            date_style,
            selection: FieldSelection::All,
        }
    }

    /// Restrict the encoded fields.
    pub fn with_selection(mut self, selection: FieldSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Encode a single record.
    pub fn encode_record(&self, record: &SourceRecord) -> Result<Map<String, Value>, SearchError> {
        self.encode_fields(record, "")
    }

    /// Encode a batch, preserving order.
    ///
    /// Error paths are prefixed with the record's position, e.g. `[2].start`.
    pub fn encode_batch(
        &self,
        records: &[SourceRecord],
    ) -> Result<Vec<Map<String, Value>>, SearchError> {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| self.encode_fields(record, &format!("[{}]", i)))
            .collect()
    }

    /// Encode a record to a JSON string.
    pub fn to_json_string(&self, record: &SourceRecord) -> Result<String, SearchError> {
        let document = self.encode_record(record)?;
        serde_json::to_string(&document).map_err(|e| SearchError::serialization("$", e.to_string()))
    }

    fn encode_fields(
        &self,
        record: &SourceRecord,
        prefix: &str,
    ) -> Result<Map<String, Value>, SearchError> {
        let mut document = Map::new();
        for (name, value) in record.fields() {
            if !self.selection.keeps(name) {
                continue;
            }
            let path = child_path(prefix, name);
            document.insert(name.clone(), self.encode_value(value, &path)?);
        }
        Ok(document)
    }

    fn encode_value(&self, value: &FieldValue, path: &str) -> Result<Value, SearchError> {
        Ok(match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::UInt(u) => Value::Number((*u).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
                SearchError::serialization(path, format!("{} is not representable in JSON", f))
            })?,
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => Value::String(format_datetime(dt, self.date_style)),
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.encode_value(item, &format!("{}[{}]", path, i)))
                    .collect::<Result<_, _>>()?,
            ),
            FieldValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.encode_value(v, &child_path(path, k))?)))
                    .collect::<Result<_, SearchError>>()?,
            ),
        })
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Render a date/time value.
///
/// Sub-second precision is written as microseconds only when non-zero, and
/// the offset only for offset-aware values.
pub fn format_datetime(value: &DateTimeValue, style: DateStyle) -> String {
    let pattern = match style {
        DateStyle::Plain => "%Y-%m-%d %H:%M:%S",
        DateStyle::Iso8601 => "%Y-%m-%dT%H:%M:%S",
    };
    let (mut out, micros) = match value {
        DateTimeValue::Naive(dt) => (dt.format(pattern).to_string(), dt.nanosecond() / 1_000),
        DateTimeValue::Offset(dt) => (dt.format(pattern).to_string(), dt.nanosecond() / 1_000),
    };
    if micros > 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    if let DateTimeValue::Offset(dt) = value {
        out.push_str(&dt.format("%:z").to_string());
    }
    out
}
