use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::CursorError;

/// Whitelisted field kind → used to coerce cursor strings back into typed key values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I64,
    Bool,
    Uuid,
    DateTimeUtc,
    Date,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::I64 => "i64",
            FieldKind::Bool => "bool",
            FieldKind::Uuid => "uuid",
            FieldKind::DateTimeUtc => "datetime",
            FieldKind::Date => "date",
        }
    }
}

/// A single sort-key value of a boundary row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    String(String),
    I64(i64),
    Bool(bool),
    Uuid(Uuid),
    DateTimeUtc(DateTime<Utc>),
    Date(NaiveDate),
}

impl KeyValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            KeyValue::String(_) => FieldKind::String,
            KeyValue::I64(_) => FieldKind::I64,
            KeyValue::Bool(_) => FieldKind::Bool,
            KeyValue::Uuid(_) => FieldKind::Uuid,
            KeyValue::DateTimeUtc(_) => FieldKind::DateTimeUtc,
            KeyValue::Date(_) => FieldKind::Date,
        }
    }

    /// Encode a key value to its cursor string form.
    pub fn encode(&self) -> String {
        match self {
            KeyValue::String(s) => s.clone(),
            KeyValue::I64(i) => i.to_string(),
            KeyValue::Bool(b) => b.to_string(),
            KeyValue::Uuid(u) => u.to_string(),
            KeyValue::DateTimeUtc(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            KeyValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Parse a cursor string based on the expected field kind.
    pub fn parse(kind: FieldKind, s: &str) -> Result<Self, CursorError> {
        let mismatch = || CursorError::KindMismatch {
            expected: kind.name(),
            got: s.to_string(),
        };

        Ok(match kind {
            FieldKind::String => KeyValue::String(s.to_string()),
            FieldKind::I64 => KeyValue::I64(s.parse::<i64>().map_err(|_| mismatch())?),
            FieldKind::Bool => KeyValue::Bool(s.parse::<bool>().map_err(|_| mismatch())?),
            FieldKind::Uuid => KeyValue::Uuid(s.parse::<Uuid>().map_err(|_| mismatch())?),
            FieldKind::DateTimeUtc => KeyValue::DateTimeUtc(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|_| mismatch())?
                    .with_timezone(&Utc),
            ),
            FieldKind::Date => {
                KeyValue::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| mismatch())?)
            }
        })
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::String(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::String(v.to_string())
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::I64(v)
    }
}

impl From<bool> for KeyValue {
    fn from(v: bool) -> Self {
        KeyValue::Bool(v)
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        KeyValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for KeyValue {
    fn from(v: DateTime<Utc>) -> Self {
        KeyValue::DateTimeUtc(v)
    }
}

impl From<NaiveDate> for KeyValue {
    fn from(v: NaiveDate) -> Self {
        KeyValue::Date(v)
    }
}
