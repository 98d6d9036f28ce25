use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use keyset_core::{FieldKind, KeyValue};
use sea_orm::{DbErr, QueryResult, Value};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub column: String,
    pub kind: FieldKind,
}

/// Logical sort field name → relation column.
#[derive(Clone, Debug, Default)]
pub struct FieldMap {
    map: HashMap<String, Field>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, api_name: impl Into<String>, column: impl Into<String>, kind: FieldKind) -> Self {
        self.map.insert(
            api_name.into().to_lowercase(),
            Field {
                column: column.into(),
                kind,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.map.get(&name.to_lowercase())
    }
}

pub(crate) fn to_db_value(v: &KeyValue) -> Value {
    match v {
        KeyValue::String(s) => s.clone().into(),
        KeyValue::I64(i) => (*i).into(),
        KeyValue::Bool(b) => (*b).into(),
        KeyValue::Uuid(u) => (*u).into(),
        KeyValue::DateTimeUtc(dt) => (*dt).into(),
        KeyValue::Date(d) => (*d).into(),
    }
}

/// Read one sort-key value from a result row.
pub(crate) fn read_key(row: &QueryResult, field: &Field) -> Result<KeyValue, DbErr> {
    let col = field.column.as_str();
    Ok(match field.kind {
        FieldKind::String => KeyValue::String(row.try_get::<String>("", col)?),
        FieldKind::I64 => KeyValue::I64(row.try_get::<i64>("", col)?),
        FieldKind::Bool => KeyValue::Bool(row.try_get::<bool>("", col)?),
        FieldKind::Uuid => KeyValue::Uuid(row.try_get::<Uuid>("", col)?),
        FieldKind::DateTimeUtc => KeyValue::DateTimeUtc(row.try_get::<DateTime<Utc>>("", col)?),
        FieldKind::Date => KeyValue::Date(row.try_get::<NaiveDate>("", col)?),
    })
}

/* ---------- LIKE helpers ---------- */

pub(crate) fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn like_contains(s: &str) -> String {
    format!("%{}%", like_escape(s.trim()))
}
