//! What a listing reads from.
//!
//! A relation is either a plain table, paged with value-seek cursors, or a
//! table-valued function / derived subquery whose rows get a per-snapshot
//! ordinal from `ROW_NUMBER()` and are paged with ordinal cursors. The kind
//! is fixed when the relation is built.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use keyset_core::{DimensionKind, FilterSet, PageError, SortKey, SortKeyError};
use sea_orm::Value;
use thiserror::Error;

use crate::field::{Field, FieldMap};
use crate::sql::OrderCol;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelationError {
    #[error("invalid function name: {0}")]
    InvalidFunctionName(String),

    #[error("derived source has {markers} parameter markers but {args} arguments")]
    MarkerMismatch { markers: usize, args: usize },

    #[error("sort field '{field}' is {declared} in the sort key but {column} in the relation")]
    KindMismatch {
        field: String,
        declared: &'static str,
        column: &'static str,
    },

    #[error(transparent)]
    SortKey(#[from] SortKeyError),
}

/// How a filter dimension maps onto columns.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterBinding {
    /// `col IN (...)`
    AnyOf(String),
    /// `col >= from AND col < to`
    TimeRange(String),
    /// `col >= from AND col <= to`
    DateRange(String),
    /// Row interval `[start, end]` intersects `[from, to)`.
    Overlaps { start: String, end: String },
    /// Case-insensitive substring over any of the columns.
    Keyword(Vec<String>),
}

impl FilterBinding {
    pub fn kind(&self) -> DimensionKind {
        match self {
            FilterBinding::AnyOf(_) => DimensionKind::AnyOf,
            FilterBinding::TimeRange(_) | FilterBinding::Overlaps { .. } => DimensionKind::TimeRange,
            FilterBinding::DateRange(_) => DimensionKind::DateRange,
            FilterBinding::Keyword(_) => DimensionKind::Keyword,
        }
    }
}

/// Keeps rows whose `end_column` date is after the snapshot date, where the
/// snapshot date is the snapshot instant seen in `tz`.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotWindow {
    pub end_column: String,
    pub tz: Tz,
}

impl SnapshotWindow {
    pub fn new(end_column: impl Into<String>, tz: Tz) -> Self {
        Self {
            end_column: end_column.into(),
            tz,
        }
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FunctionSource {
    /// `name(arg, ...)`, a table-valued function.
    Call { name: String, args: Vec<Value> },
    /// A subquery; every `?` in `sql` is a parameter marker for `args`, taken
    /// in order. The split is purely textual: a `?` inside a string literal or
    /// an operator such as Postgres `?|` is a marker too, so such values must
    /// be passed as args. The marker count must equal `args.len()`.
    Derived { sql: String, args: Vec<Value> },
}

pub(crate) enum Source<'a> {
    Table(&'a str),
    Call { name: &'a str, args: &'a [Value] },
    Derived { sql: &'a str, args: &'a [Value] },
}

/// Columns, filters and tie-break shared by both relation kinds.
#[derive(Clone, Debug)]
pub struct Shape {
    label: String,
    fields: FieldMap,
    unique: String,
    filters: HashMap<String, FilterBinding>,
}

#[derive(Clone, Debug)]
pub struct TableBacked {
    pub table: String,
    pub shape: Shape,
    pub snapshot: Option<SnapshotWindow>,
}

#[derive(Clone, Debug)]
pub struct FunctionBacked {
    pub source: FunctionSource,
    pub shape: Shape,
    pub snapshot: SnapshotWindow,
}

#[derive(Clone, Debug)]
pub enum Relation {
    TableBacked(TableBacked),
    FunctionBacked(FunctionBacked),
}

impl Relation {
    /// `unique` is the sort field every sort key over this relation must end with.
    pub fn table(table: impl Into<String>, fields: FieldMap, unique: impl Into<String>) -> Self {
        let table = table.into();
        Relation::TableBacked(TableBacked {
            shape: Shape {
                label: table.clone(),
                fields,
                unique: unique.into(),
                filters: HashMap::new(),
            },
            table,
            snapshot: None,
        })
    }

    pub fn function(
        label: impl Into<String>,
        source: FunctionSource,
        snapshot: SnapshotWindow,
        fields: FieldMap,
        unique: impl Into<String>,
    ) -> Result<Self, RelationError> {
        match &source {
            FunctionSource::Call { name, .. } => {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                if !valid {
                    return Err(RelationError::InvalidFunctionName(name.clone()));
                }
            }
            FunctionSource::Derived { sql, args } => {
                let markers = sql.matches('?').count();
                if markers != args.len() {
                    return Err(RelationError::MarkerMismatch {
                        markers,
                        args: args.len(),
                    });
                }
            }
        }
        Ok(Relation::FunctionBacked(FunctionBacked {
            source,
            shape: Shape {
                label: label.into(),
                fields,
                unique: unique.into(),
                filters: HashMap::new(),
            },
            snapshot,
        }))
    }

    pub fn with_filter(mut self, dimension: impl Into<String>, binding: FilterBinding) -> Self {
        self.shape_mut()
            .filters
            .insert(dimension.into().to_lowercase(), binding);
        self
    }

    /// Only for table-backed relations; function-backed ones always carry one.
    pub fn with_snapshot_window(mut self, window: SnapshotWindow) -> Self {
        if let Relation::TableBacked(t) = &mut self {
            t.snapshot = Some(window);
        }
        self
    }

    pub fn label(&self) -> &str {
        &self.shape().label
    }

    pub fn is_function_backed(&self) -> bool {
        matches!(self, Relation::FunctionBacked(_))
    }

    pub fn snapshot_window(&self) -> Option<&SnapshotWindow> {
        match self {
            Relation::TableBacked(t) => t.snapshot.as_ref(),
            Relation::FunctionBacked(f) => Some(&f.snapshot),
        }
    }

    pub fn binding(&self, dimension: &str) -> Option<&FilterBinding> {
        self.shape().filters.get(&dimension.to_lowercase())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.shape().fields.get(name)
    }

    /// Configuration-time check: every sort field is a known column of the
    /// declared kind and the key ends with the relation's unique field.
    pub fn validate_sort_key(&self, key: &SortKey) -> Result<(), RelationError> {
        self.order_columns(key).map(|_| ())
    }

    pub(crate) fn order_columns(&self, key: &SortKey) -> Result<Vec<OrderCol>, RelationError> {
        let shape = self.shape();
        if !key.tiebreaker().field.eq_ignore_ascii_case(&shape.unique) {
            return Err(SortKeyError::MissingTiebreaker(shape.unique.clone()).into());
        }
        key.fields()
            .iter()
            .map(|f| {
                let col = shape
                    .fields
                    .get(&f.field)
                    .ok_or_else(|| SortKeyError::UnknownField(f.field.clone()))?;
                if col.kind != f.kind {
                    return Err(RelationError::KindMismatch {
                        field: f.field.clone(),
                        declared: f.kind.name(),
                        column: col.kind.name(),
                    });
                }
                Ok(OrderCol {
                    column: col.column.clone(),
                    dir: f.dir,
                })
            })
            .collect()
    }

    pub fn check_filters(&self, filters: &FilterSet) -> Result<(), PageError> {
        filters.validate(|name| self.binding(name).map(FilterBinding::kind))
    }

    pub(crate) fn source(&self) -> Source<'_> {
        match self {
            Relation::TableBacked(t) => Source::Table(&t.table),
            Relation::FunctionBacked(f) => match &f.source {
                FunctionSource::Call { name, args } => Source::Call { name, args },
                FunctionSource::Derived { sql, args } => Source::Derived { sql, args },
            },
        }
    }

    fn shape(&self) -> &Shape {
        match self {
            Relation::TableBacked(t) => &t.shape,
            Relation::FunctionBacked(f) => &f.shape,
        }
    }

    fn shape_mut(&mut self) -> &mut Shape {
        match self {
            Relation::TableBacked(t) => &mut t.shape,
            Relation::FunctionBacked(f) => &mut f.shape,
        }
    }
}
