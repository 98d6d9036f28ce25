//! Filter dimensions accepted by list queries.
//!
//! A `FilterSet` maps a dimension name to the values a row must match. An
//! empty dimension is unrestricted. What a dimension *means* is decided by
//! the relation that binds it to columns.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::PageError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DimensionKind {
    AnyOf,
    TimeRange,
    DateRange,
    Keyword,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterValue {
    /// Row value must be one of these (ids, status enum members).
    AnyOf(BTreeSet<String>),
    /// Half-open instant range `[from, to)`; either side may be open.
    TimeRange {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Inclusive date range; either side may be open.
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Case-insensitive substring match.
    Keyword(String),
}

impl FilterValue {
    pub fn kind(&self) -> DimensionKind {
        match self {
            FilterValue::AnyOf(_) => DimensionKind::AnyOf,
            FilterValue::TimeRange { .. } => DimensionKind::TimeRange,
            FilterValue::DateRange { .. } => DimensionKind::DateRange,
            FilterValue::Keyword(_) => DimensionKind::Keyword,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        match self {
            FilterValue::AnyOf(values) => values.is_empty(),
            FilterValue::TimeRange { from, to } => from.is_none() && to.is_none(),
            FilterValue::DateRange { from, to } => from.is_none() && to.is_none(),
            FilterValue::Keyword(k) => k.trim().is_empty(),
        }
    }

    fn check(&self, dimension: &str) -> Result<(), PageError> {
        match self {
            FilterValue::AnyOf(values) => {
                if values.iter().any(|v| v.trim().is_empty()) {
                    return Err(PageError::invalid_filter(format!(
                        "{dimension}: blank value"
                    )));
                }
            }
            FilterValue::TimeRange {
                from: Some(from),
                to: Some(to),
            } if from > to => {
                return Err(PageError::invalid_filter(format!(
                    "{dimension}: range start {from} is after end {to}"
                )));
            }
            FilterValue::DateRange {
                from: Some(from),
                to: Some(to),
            } if from > to => {
                return Err(PageError::invalid_filter(format!(
                    "{dimension}: range start {from} is after end {to}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    fn normalized(&self) -> String {
        match self {
            FilterValue::AnyOf(values) => format!(
                "ANY({})",
                values.iter().cloned().collect::<Vec<_>>().join(",")
            ),
            FilterValue::TimeRange { from, to } => format!(
                "TIME({},{})",
                from.map(|d| d.to_rfc3339()).unwrap_or_default(),
                to.map(|d| d.to_rfc3339()).unwrap_or_default()
            ),
            FilterValue::DateRange { from, to } => format!(
                "DATE({},{})",
                from.map(|d| d.to_string()).unwrap_or_default(),
                to.map(|d| d.to_string()).unwrap_or_default()
            ),
            FilterValue::Keyword(k) => format!("KW({})", k.trim().to_lowercase()),
        }
    }

    /// Which sides are bounded, without the bound values.
    fn shape(&self) -> String {
        let side = |bounded: bool| if bounded { "*" } else { "" };
        match self {
            FilterValue::AnyOf(_) => "ANY".to_owned(),
            FilterValue::TimeRange { from, to } => {
                format!("TIME({},{})", side(from.is_some()), side(to.is_some()))
            }
            FilterValue::DateRange { from, to } => {
                format!("DATE({},{})", side(from.is_some()), side(to.is_some()))
            }
            FilterValue::Keyword(_) => "KW".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSet {
    dims: BTreeMap<String, FilterValue>,
    floating: BTreeSet<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: impl Into<String>, value: FilterValue) -> Self {
        self.dims.insert(dimension.into().to_lowercase(), value);
        self
    }

    pub fn with_any_of<I, S>(self, dimension: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.with(dimension, FilterValue::AnyOf(set))
    }

    pub fn with_time_range(
        self,
        dimension: impl Into<String>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.with(dimension, FilterValue::TimeRange { from, to })
    }

    pub fn with_date_range(
        self,
        dimension: impl Into<String>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        self.with(dimension, FilterValue::DateRange { from, to })
    }

    pub fn with_keyword(self, dimension: impl Into<String>, keyword: impl Into<String>) -> Self {
        self.with(dimension, FilterValue::Keyword(keyword.into()))
    }

    /// Mark a dimension whose bound values may move between page requests,
    /// such as a window anchored at the caller's clock. It still restricts
    /// rows, but only its shape is part of the fingerprint.
    pub fn floating(mut self, dimension: impl Into<String>) -> Self {
        self.floating.insert(dimension.into().to_lowercase());
        self
    }

    pub fn is_floating(&self, dimension: &str) -> bool {
        self.floating.contains(&dimension.to_lowercase())
    }

    pub fn get(&self, dimension: &str) -> Option<&FilterValue> {
        self.dims.get(&dimension.to_lowercase())
    }

    /// Dimensions that actually restrict rows.
    pub fn active(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.dims
            .iter()
            .filter(|(_, v)| !v.is_unrestricted())
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.dims.keys().map(String::as_str)
    }

    /// Check every dimension against the kinds a relation accepts.
    pub fn validate(&self, accepts: impl Fn(&str) -> Option<DimensionKind>) -> Result<(), PageError> {
        for (name, value) in &self.dims {
            let expected = accepts(name).ok_or_else(|| {
                PageError::invalid_filter(format!("unknown filter dimension: {name}"))
            })?;
            if expected != value.kind() {
                return Err(PageError::invalid_filter(format!(
                    "{name}: expected {expected:?} value, got {:?}",
                    value.kind()
                )));
            }
            value.check(name)?;
        }
        Ok(())
    }

    /// Short stable hash of the restricting dimensions, carried by cursors.
    /// Returns a 16-character hex string (64-bit hash).
    pub fn fingerprint(&self) -> String {
        let normalized = self
            .active()
            .map(|(k, v)| {
                if self.floating.contains(k) {
                    format!("{k}~{}", v.shape())
                } else {
                    format!("{k}={}", v.normalized())
                }
            })
            .collect::<Vec<_>>()
            .join(";");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let bytes = hasher.finalize();
        hex::encode(&bytes[..8])
    }
}
