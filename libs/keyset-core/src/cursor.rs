//! Opaque page tokens.
//!
//! A token is `base64url(json)`. Value-seek tokens carry the boundary row's
//! sort-key values (`k`); ordinal tokens carry a row number (`n`) and the
//! snapshot date (`d`) the numbering was computed for. Both carry the sort
//! signature (`s`) and the filter fingerprint (`f`), so a token replayed
//! under another ordering, filter set or snapshot fails closed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CursorError, FilterSet, KeyValue, SortKey};

const VERSION: u8 = 1;

pub mod base64_url {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Wire {
    v: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    k: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<u64>,
    s: String,
    f: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
}

impl Wire {
    fn encode(&self) -> Result<String, CursorError> {
        let json = serde_json::to_vec(self).map_err(|_| CursorError::InvalidJson)?;
        Ok(base64_url::encode(&json))
    }

    /// Structural checks only; consistency with the active query is checked
    /// by the codec.
    fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = base64_url::decode(token.trim()).map_err(|_| CursorError::InvalidBase64)?;
        let wire: Wire = serde_json::from_slice(&bytes).map_err(|_| CursorError::InvalidJson)?;
        if wire.v != VERSION {
            return Err(CursorError::InvalidVersion);
        }
        match (&wire.k, wire.n) {
            (Some(k), None) if k.is_empty() => return Err(CursorError::InvalidKeys),
            (Some(_), None) => {}
            (None, Some(n)) if !ordinal_in_range(n) => return Err(CursorError::InvalidOrdinal),
            (None, Some(_)) => {}
            _ => return Err(CursorError::InvalidKeys),
        }
        if wire.s.trim().is_empty() {
            return Err(CursorError::InvalidFields);
        }
        Ok(wire)
    }
}

/// Row numbers are 1-based and must fit the store's signed 64-bit integers.
fn ordinal_in_range(n: u64) -> bool {
    n >= 1 && i64::try_from(n).is_ok()
}

/// Where the next fetch resumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resume {
    /// Seek past these sort-key values.
    Seek(Vec<KeyValue>),
    /// Continue from this row number (1-based) of the numbered relation.
    Ordinal(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Mode {
    ValueSeek,
    Ordinal { snapshot_date: NaiveDate },
}

/// Encodes and decodes tokens bound to one sort key and filter set.
#[derive(Clone, Debug)]
pub struct CursorCodec {
    sort_key: SortKey,
    fingerprint: String,
    mode: Mode,
}

impl CursorCodec {
    pub fn value_seek(sort_key: &SortKey, filters: &FilterSet) -> Self {
        Self {
            sort_key: sort_key.clone(),
            fingerprint: filters.fingerprint(),
            mode: Mode::ValueSeek,
        }
    }

    pub fn ordinal(sort_key: &SortKey, filters: &FilterSet, snapshot_date: NaiveDate) -> Self {
        Self {
            sort_key: sort_key.clone(),
            fingerprint: filters.fingerprint(),
            mode: Mode::Ordinal { snapshot_date },
        }
    }

    pub fn sort_key(&self) -> &SortKey {
        &self.sort_key
    }

    pub fn encode_values(&self, values: &[KeyValue]) -> Result<String, CursorError> {
        if self.mode != Mode::ValueSeek {
            return Err(CursorError::WrongVariant("value-seek"));
        }
        self.check_values(values)?;
        Wire {
            v: VERSION,
            k: Some(values.iter().map(KeyValue::encode).collect()),
            n: None,
            s: self.sort_key.signature(),
            f: self.fingerprint.clone(),
            d: None,
        }
        .encode()
    }

    pub fn encode_ordinal(&self, row_number: u64) -> Result<String, CursorError> {
        let Mode::Ordinal { snapshot_date } = self.mode else {
            return Err(CursorError::WrongVariant("ordinal"));
        };
        if !ordinal_in_range(row_number) {
            return Err(CursorError::InvalidOrdinal);
        }
        Wire {
            v: VERSION,
            k: None,
            n: Some(row_number),
            s: self.sort_key.signature(),
            f: self.fingerprint.clone(),
            d: Some(snapshot_date.to_string()),
        }
        .encode()
    }

    pub fn decode(&self, token: &str) -> Result<Resume, CursorError> {
        let wire = Wire::decode(token)?;

        if !self.sort_key.matches_signature(&wire.s) {
            return Err(CursorError::SortKeyMismatch {
                cursor: wire.s,
                active: self.sort_key.signature(),
            });
        }
        if wire.f != self.fingerprint {
            return Err(CursorError::FilterMismatch);
        }

        match (&self.mode, wire.k, wire.n) {
            (Mode::ValueSeek, Some(keys), _) => {
                if keys.len() != self.sort_key.arity() {
                    return Err(CursorError::ArityMismatch {
                        expected: self.sort_key.arity(),
                        got: keys.len(),
                    });
                }
                let values = keys
                    .iter()
                    .zip(self.sort_key.fields())
                    .map(|(raw, field)| KeyValue::parse(field.kind, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Resume::Seek(values))
            }
            (Mode::ValueSeek, None, _) => Err(CursorError::WrongVariant("ordinal")),
            (Mode::Ordinal { snapshot_date }, None, Some(n)) => {
                let active = snapshot_date.to_string();
                match wire.d {
                    Some(d) if d == active => Ok(Resume::Ordinal(n)),
                    other => Err(CursorError::SnapshotMismatch {
                        cursor: other.unwrap_or_default(),
                        active,
                    }),
                }
            }
            (Mode::Ordinal { .. }, _, _) => Err(CursorError::WrongVariant("value-seek")),
        }
    }

    fn check_values(&self, values: &[KeyValue]) -> Result<(), CursorError> {
        if values.len() != self.sort_key.arity() {
            return Err(CursorError::ArityMismatch {
                expected: self.sort_key.arity(),
                got: values.len(),
            });
        }
        for (value, field) in values.iter().zip(self.sort_key.fields()) {
            if value.kind() != field.kind {
                return Err(CursorError::KindMismatch {
                    expected: field.kind.name(),
                    got: value.encode(),
                });
            }
        }
        Ok(())
    }
}
