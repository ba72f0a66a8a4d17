//! Decoded trace events.
//!
//! The engine does not decode trace files itself; an upstream reader
//! delivers fully-decoded [`Event`]s in non-decreasing timestamp order.
//! Field payloads use [`FieldValue`], a small dynamic value tree.

pub mod jsonl;
pub mod schema;

pub use jsonl::JsonTraceOpener;
pub use schema::{EventSource, TraceInfo, TraceSet, TraceOpener};

use std::collections::BTreeMap;

use crate::types::{EventId, Time, TraceId};

/// A decoded event field value.
///
/// One enum covers every field kind a reader can produce; unsupported
/// payload kinds decode to [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Signed integer field.
    Sint(i64),
    /// Unsigned integer field.
    Uint(u64),
    /// Floating point field.
    Float(f64),
    /// String field.
    Str(String),
    /// Nested dictionary of named fields.
    Dict(BTreeMap<String, FieldValue>),
    /// Missing or unsupported field.
    Null,
}

impl FieldValue {
    /// Returns true if this field is missing or unsupported.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the signed integer payload, if that is the field kind.
    #[must_use]
    pub const fn as_sint(&self) -> Option<i64> {
        match self {
            Self::Sint(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the unsigned integer payload, if that is the field kind.
    #[must_use]
    pub const fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer payload of either signedness as `i64`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Sint(v) => Some(*v),
            Self::Uint(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns the float payload, if that is the field kind.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if that is the field kind.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a named sub-field of a dictionary field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self {
            Self::Dict(fields) => fields.get(name),
            _ => None,
        }
    }
}

/// A fully-decoded trace event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Ordinal of the originating trace within the playback set.
    pub trace_id: TraceId,
    /// Canonical event id within the trace.
    pub id: EventId,
    /// Event name, unique within the trace.
    pub name: String,
    /// Event timestamp.
    pub ts: Time,
    /// Event payload: a dictionary, or `Null` when the event has none.
    pub fields: FieldValue,
}

impl Event {
    /// Returns a named payload field, or `None` when the event has no
    /// payload or no field of that name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.field(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_accessors_match_kinds() {
        let mut dict = BTreeMap::new();
        dict.insert("tid".to_owned(), FieldValue::Uint(42));
        dict.insert("comm".to_owned(), FieldValue::Str("bash".to_owned()));
        let fields = FieldValue::Dict(dict);

        assert_eq!(fields.field("tid").unwrap().as_uint(), Some(42));
        assert_eq!(fields.field("tid").unwrap().as_int(), Some(42));
        assert_eq!(fields.field("comm").unwrap().as_str(), Some("bash"));
        assert!(fields.field("missing").is_none());
        assert_eq!(FieldValue::Sint(-1).as_uint(), None);
    }

    #[test]
    fn event_field_goes_through_payload() {
        let event = Event {
            trace_id: TraceId::from_raw(0),
            id: EventId::from_raw(1),
            name: "sched_switch".to_owned(),
            ts: Time::from_nanos(5),
            fields: FieldValue::Null,
        };
        assert!(event.field("tid").is_none());
    }
}
