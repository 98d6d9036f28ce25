use chrono::{DateTime, NaiveDate, Utc};
use keyset_core::{
    assemble, evaluate, CursorCodec, CursorError, Direction, FilterSet, KeyValue, LimitCfg, Page,
    PageError, PageRequest, Resume, SortKey,
};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, FromQueryResult, QueryResult, Statement};
use tracing::{debug, instrument, warn};

use crate::field::read_key;
use crate::relation::Relation;
use crate::sql::{OrderCol, SqlWriter, ROW_NUM, TOTAL};

/// Where a fetched row sits, used to mint its token.
enum Mark {
    Keys(Vec<KeyValue>),
    Ordinal(u64),
}

struct Fetched<R> {
    item: R,
    mark: Mark,
}

/// Runs one COUNT and one bounded fetch per page request. Read-only.
pub struct PageExecutor<'a, C> {
    conn: &'a C,
}

impl<'a, C> PageExecutor<'a, C>
where
    C: ConnectionTrait,
{
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    #[instrument(
        name = "keyset.fetch_page",
        skip_all,
        fields(
            relation = %relation.label(),
            sort = %sort_key.signature(),
            direction = ?request.direction,
            limit = ?request.limit
        )
    )]
    pub async fn fetch_page<R>(
        &self,
        relation: &Relation,
        sort_key: &SortKey,
        filters: &FilterSet,
        request: &PageRequest,
        limits: &LimitCfg,
    ) -> Result<Page<R>, PageError>
    where
        R: FromQueryResult,
    {
        let limit = limits.resolve(request.limit)?;
        relation.check_filters(filters)?;
        let order = relation
            .order_columns(sort_key)
            .map_err(|e| PageError::invalid_filter(e.to_string()))?;
        let snapshot = snapshot_date(relation, request.snapshot)?;

        let codec = match snapshot {
            Some(date) if relation.is_function_backed() => {
                CursorCodec::ordinal(sort_key, filters, date)
            }
            _ => CursorCodec::value_seek(sort_key, filters),
        };
        let resume = request.cursor().map(|t| codec.decode(t)).transpose()?;

        let backend = self.conn.get_database_backend();
        let total = self.count(backend, relation, filters, snapshot).await?;

        let stmt = if relation.is_function_backed() {
            let after = match &resume {
                Some(Resume::Ordinal(n)) => {
                    Some(i64::try_from(*n).map_err(|_| CursorError::InvalidOrdinal)?)
                }
                Some(Resume::Seek(_)) => return Err(CursorError::WrongVariant("value-seek").into()),
                None => None,
            };
            ordinal_fetch(backend, relation, &order, filters, snapshot, after, request.direction, limit)
        } else {
            let seek = match &resume {
                Some(Resume::Seek(values)) => Some(values.as_slice()),
                Some(Resume::Ordinal(_)) => return Err(CursorError::WrongVariant("ordinal").into()),
                None => None,
            };
            seek_fetch(backend, relation, &order, filters, snapshot, seek, request.direction, limit)
        };
        debug!(sql = %stmt.sql, "page fetch");

        let rows = self.conn.query_all(stmt).await.map_err(store_error)?;
        let fetched_count = rows.len();
        let fetched = rows
            .iter()
            .map(|row| decode_row::<R>(row, relation, sort_key))
            .collect::<Result<Vec<_>, _>>()?;

        let window = evaluate(fetched, limit, request.direction, request.cursor());
        let page = assemble(window, limit, total, |f| {
            let token = match &f.mark {
                Mark::Keys(values) => codec.encode_values(values),
                Mark::Ordinal(n) => codec.encode_ordinal(*n),
            };
            token.map_err(|e| PageError::backing_store(format!("cannot encode boundary row: {e}")))
        })?;

        debug!(
            total,
            fetched = fetched_count,
            returned = page.items.len(),
            has_next = page.page_info.next_cursor.is_some(),
            has_previous = page.page_info.prev_cursor.is_some(),
            "page assembled"
        );
        Ok(page.map_items(|f| f.item))
    }

    /// The row at `row_number` (1-based) of a function-backed relation under
    /// the given filters, sort key and snapshot.
    #[instrument(
        name = "keyset.lookup_ordinal",
        skip_all,
        fields(relation = %relation.label(), row_number = row_number)
    )]
    pub async fn lookup_ordinal<R>(
        &self,
        relation: &Relation,
        sort_key: &SortKey,
        filters: &FilterSet,
        snapshot: DateTime<Utc>,
        row_number: u64,
    ) -> Result<Option<R>, PageError>
    where
        R: FromQueryResult,
    {
        if !relation.is_function_backed() {
            return Err(PageError::invalid_filter(format!(
                "{} has no row numbering",
                relation.label()
            )));
        }
        relation.check_filters(filters)?;
        let order = relation
            .order_columns(sort_key)
            .map_err(|e| PageError::invalid_filter(e.to_string()))?;
        // row numbers start at 1 and never exceed i64::MAX
        let row_number = match i64::try_from(row_number) {
            Ok(n) if n >= 1 => n,
            _ => return Ok(None),
        };
        let snapshot = snapshot_date(relation, Some(snapshot))?;

        let mut w = SqlWriter::new(self.conn.get_database_backend());
        w.windowed(relation, &order, filters, snapshot)
            .push(" WHERE ")
            .ident(ROW_NUM)
            .push(" = ")
            .bind(row_number)
            .limit(1);
        let stmt = w.finish();
        debug!(sql = %stmt.sql, "ordinal lookup");

        let row = self.conn.query_one(stmt).await.map_err(store_error)?;
        row.map(|r| R::from_query_result(&r, "").map_err(store_error))
            .transpose()
    }

    async fn count(
        &self,
        backend: DbBackend,
        relation: &Relation,
        filters: &FilterSet,
        snapshot: Option<NaiveDate>,
    ) -> Result<u64, PageError> {
        let mut w = SqlWriter::new(backend);
        w.push("SELECT COUNT(*) AS ")
            .ident(TOTAL)
            .push(" FROM ")
            .source(relation)
            .where_clause(relation, filters, snapshot);
        let stmt = w.finish();
        debug!(sql = %stmt.sql, "page count");

        let row = self
            .conn
            .query_one(stmt)
            .await
            .map_err(store_error)?
            .ok_or_else(|| PageError::backing_store("COUNT returned no row"))?;
        let total = row.try_get::<i64>("", TOTAL).map_err(store_error)?;
        Ok(total.max(0) as u64)
    }
}

fn store_error(e: DbErr) -> PageError {
    warn!(error = %e, "backing store failure");
    PageError::backing_store(e)
}

fn snapshot_date(relation: &Relation, snapshot: Option<DateTime<Utc>>) -> Result<Option<NaiveDate>, PageError> {
    match relation.snapshot_window() {
        None => Ok(None),
        Some(window) => snapshot.map(|s| Some(window.date_of(s))).ok_or_else(|| {
            PageError::invalid_filter(format!(
                "{} requires an explicit snapshot instant",
                relation.label()
            ))
        }),
    }
}

fn effective_order(order: &[OrderCol], direction: Direction) -> Vec<OrderCol> {
    match direction {
        Direction::Forward => order.to_vec(),
        Direction::Backward => order
            .iter()
            .map(|o| OrderCol {
                column: o.column.clone(),
                dir: o.dir.reverse(),
            })
            .collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn seek_fetch(
    backend: DbBackend,
    relation: &Relation,
    order: &[OrderCol],
    filters: &FilterSet,
    snapshot: Option<NaiveDate>,
    seek: Option<&[KeyValue]>,
    direction: Direction,
    limit: u32,
) -> Statement {
    let order = effective_order(order, direction);
    let mut w = SqlWriter::new(backend);
    w.push("SELECT src.* FROM ")
        .source(relation)
        .where_clause(relation, filters, snapshot);
    if let Some(values) = seek {
        w.seek(&order, values);
    }
    w.order_by(&order).limit(u64::from(limit) + 1);
    w.finish()
}

#[allow(clippy::too_many_arguments)]
fn ordinal_fetch(
    backend: DbBackend,
    relation: &Relation,
    order: &[OrderCol],
    filters: &FilterSet,
    snapshot: Option<NaiveDate>,
    after: Option<i64>,
    direction: Direction,
    limit: u32,
) -> Statement {
    let mut w = SqlWriter::new(backend);
    w.windowed(relation, order, filters, snapshot);
    if let Some(n) = after {
        let op = match direction {
            Direction::Forward => " > ",
            Direction::Backward => " < ",
        };
        w.push(" WHERE ").ident(ROW_NUM).push(op).bind(n);
    }
    w.push(" ORDER BY ").ident(ROW_NUM).push(match direction {
        Direction::Forward => " ASC",
        Direction::Backward => " DESC",
    });
    w.limit(u64::from(limit) + 1);
    w.finish()
}

fn decode_row<R: FromQueryResult>(
    row: &QueryResult,
    relation: &Relation,
    sort_key: &SortKey,
) -> Result<Fetched<R>, PageError> {
    let item = R::from_query_result(row, "").map_err(store_error)?;
    let mark = if relation.is_function_backed() {
        let n = row.try_get::<i64>("", ROW_NUM).map_err(store_error)?;
        Mark::Ordinal(n.max(0) as u64)
    } else {
        let values = sort_key
            .fields()
            .iter()
            .map(|f| {
                let field = relation.field(&f.field).ok_or_else(|| {
                    PageError::backing_store(format!("row has no sort field '{}'", f.field))
                })?;
                read_key(row, field).map_err(store_error)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Mark::Keys(values)
    };
    Ok(Fetched { item, mark })
}
