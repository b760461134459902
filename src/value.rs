//! The projected form of a plist value.
//!
//! Everything the projector keeps from AlbumData.xml ends up as a [`Value`]:
//! folder records, image records and the keyword and face tables are all built
//! from these before being given typed accessors.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Seconds between the Unix epoch and the Cocoa reference date
/// (2001-01-01T00:00:00Z) that plist dates count from.
pub const APPLE_EPOCH: i64 = 978_307_200;

/// A plist `<dict>`. Keys keep the order they had in the document.
pub type Mapping = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Name of the plist element this variant comes from, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "string",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Timestamp(_) => "date",
            Value::Blob(_) => "data",
            Value::Sequence(_) => "array",
            Value::Mapping(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view. Reals are accepted when they hold a whole number and text
    /// when it parses; iPhoto is not consistent about which one it writes.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Timestamp view. Numbers are read as seconds since the Cocoa reference
    /// date, which is how folder records store their creation time.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Real(_) | Value::Integer(_) => self.as_f64().and_then(apple_date),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Looks up `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Keys of a mapping in document order; empty for every other variant.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.as_mapping()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Identifier view: ids are written as `<string>` in some places and as
    /// `<integer>` in others (face keys), both refer to the same table key.
    pub fn to_id(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

/// Converts seconds since 2001-01-01T00:00:00Z into a UTC timestamp,
/// keeping millisecond precision. `None` when out of range.
pub fn apple_date(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    DateTime::from_timestamp_millis(APPLE_EPOCH * 1000 + millis as i64)
}
