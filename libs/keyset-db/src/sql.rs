//! Parameterized SQL text for the page executor.
//!
//! Every statement reads from `<source> AS src`, where the source is either a
//! table or a function call / derived subquery. User input only ever reaches
//! the database as bound values.

use keyset_core::{FilterSet, FilterValue, KeyValue, SortDir};
use sea_orm::{DbBackend, Statement, Value};

use crate::field::{like_contains, to_db_value};
use crate::relation::{FilterBinding, Relation, Source};

pub(crate) const ROW_NUM: &str = "row_num";
pub(crate) const TOTAL: &str = "total";

/// Resolved ORDER BY entry.
#[derive(Clone, Debug)]
pub(crate) struct OrderCol {
    pub column: String,
    pub dir: SortDir,
}

pub(crate) fn quote_identifier(backend: DbBackend, name: &str) -> String {
    match backend {
        DbBackend::MySql => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

pub(crate) struct SqlWriter {
    backend: DbBackend,
    sql: String,
    values: Vec<Value>,
}

impl SqlWriter {
    pub fn new(backend: DbBackend) -> Self {
        Self {
            backend,
            sql: String::with_capacity(256),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, s: &str) -> &mut Self {
        self.sql.push_str(s);
        self
    }

    pub fn bind(&mut self, v: impl Into<Value>) -> &mut Self {
        self.values.push(v.into());
        match self.backend {
            DbBackend::Postgres => {
                let n = self.values.len();
                self.sql.push_str(&format!("${n}"));
            }
            _ => self.sql.push('?'),
        }
        self
    }

    /// `src."column"`
    pub fn col(&mut self, column: &str) -> &mut Self {
        let quoted = quote_identifier(self.backend, column);
        self.sql.push_str("src.");
        self.sql.push_str(&quoted);
        self
    }

    pub fn ident(&mut self, name: &str) -> &mut Self {
        let quoted = quote_identifier(self.backend, name);
        self.sql.push_str(&quoted);
        self
    }

    pub fn finish(self) -> Statement {
        Statement::from_sql_and_values(self.backend, self.sql, self.values)
    }

    #[cfg(test)]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /* ---------- fragments ---------- */

    pub fn source(&mut self, relation: &Relation) -> &mut Self {
        match relation.source() {
            Source::Table(table) => {
                self.ident(table);
            }
            Source::Call { name, args } => {
                self.push(name).push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(arg.clone());
                }
                self.push(")");
            }
            Source::Derived { sql, args } => {
                self.push("(");
                let mut args = args.iter();
                // textual split, literals included; see FunctionSource::Derived
                for (i, part) in sql.split('?').enumerate() {
                    if i > 0 {
                        // marker count is checked when the relation is built
                        if let Some(arg) = args.next() {
                            self.bind(arg.clone());
                        }
                    }
                    self.push(part);
                }
                self.push(")");
            }
        }
        self.push(" AS src");
        self
    }

    /// ` WHERE <snapshot> AND <filters>`; `1=1` keeps the chain uniform.
    pub fn where_clause(&mut self, relation: &Relation, filters: &FilterSet, snapshot: Option<chrono::NaiveDate>) -> &mut Self {
        self.push(" WHERE 1=1");
        if let (Some(window), Some(date)) = (relation.snapshot_window(), snapshot) {
            self.push(" AND ").col(&window.end_column).push(" > ").bind(date);
        }
        for (dimension, value) in filters.active() {
            if let Some(binding) = relation.binding(dimension) {
                self.filter(binding, value);
            }
        }
        self
    }

    fn filter(&mut self, binding: &FilterBinding, value: &FilterValue) {
        match (binding, value) {
            (FilterBinding::AnyOf(col), FilterValue::AnyOf(values)) => {
                self.push(" AND ").col(col).push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(v.clone());
                }
                self.push(")");
            }
            (FilterBinding::TimeRange(col), FilterValue::TimeRange { from, to }) => {
                if let Some(from) = from {
                    self.push(" AND ").col(col).push(" >= ").bind(*from);
                }
                if let Some(to) = to {
                    self.push(" AND ").col(col).push(" < ").bind(*to);
                }
            }
            (FilterBinding::DateRange(col), FilterValue::DateRange { from, to }) => {
                if let Some(from) = from {
                    self.push(" AND ").col(col).push(" >= ").bind(*from);
                }
                if let Some(to) = to {
                    self.push(" AND ").col(col).push(" <= ").bind(*to);
                }
            }
            (FilterBinding::Overlaps { start, end }, FilterValue::TimeRange { from, to }) => {
                if let Some(from) = from {
                    self.push(" AND ").col(end).push(" >= ").bind(*from);
                }
                if let Some(to) = to {
                    self.push(" AND ").col(start).push(" < ").bind(*to);
                }
            }
            (FilterBinding::Keyword(cols), FilterValue::Keyword(keyword)) => {
                let pattern = like_contains(keyword);
                self.push(" AND (");
                for (i, col) in cols.iter().enumerate() {
                    if i > 0 {
                        self.push(" OR ");
                    }
                    self.push("LOWER(")
                        .col(col)
                        .push(") LIKE LOWER(")
                        .bind(pattern.clone())
                        .push(") ESCAPE '\\'");
                }
                self.push(")");
            }
            // kinds are validated before any statement is built
            _ => {}
        }
    }

    /// Lexicographic seek past `values` under `order`:
    /// `(k0 > v0) OR (k0 = v0 AND k1 > v1) OR ...`, `<` for descending keys.
    pub fn seek(&mut self, order: &[OrderCol], values: &[KeyValue]) -> &mut Self {
        self.push(" AND (");
        for i in 0..order.len() {
            if i > 0 {
                self.push(" OR ");
            }
            self.push("(");
            for (col, value) in order.iter().zip(values).take(i) {
                self.col(&col.column).push(" = ").bind(to_db_value(value)).push(" AND ");
            }
            let op = match order[i].dir {
                SortDir::Asc => " > ",
                SortDir::Desc => " < ",
            };
            self.col(&order[i].column).push(op).bind(to_db_value(&values[i]));
            self.push(")");
        }
        self.push(")");
        self
    }

    pub fn order_by(&mut self, order: &[OrderCol]) -> &mut Self {
        self.push(" ORDER BY ");
        self.order_list(order);
        self
    }

    fn order_list(&mut self, order: &[OrderCol]) {
        for (i, o) in order.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.col(&o.column).push(match o.dir {
                SortDir::Asc => " ASC",
                SortDir::Desc => " DESC",
            });
        }
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.push(" LIMIT ").bind(n as i64)
    }

    /// Opens `WITH windowed AS (SELECT src.*, ROW_NUMBER() OVER (...) AS "row_num" FROM ... WHERE ...)`.
    pub fn windowed(&mut self, relation: &Relation, order: &[OrderCol], filters: &FilterSet, snapshot: Option<chrono::NaiveDate>) -> &mut Self {
        self.push("WITH windowed AS (SELECT src.*, ROW_NUMBER() OVER (ORDER BY ");
        self.order_list(order);
        self.push(") AS ").ident(ROW_NUM).push(" FROM ");
        self.source(relation);
        self.where_clause(relation, filters, snapshot);
        self.push(") SELECT * FROM windowed");
        self
    }
}
