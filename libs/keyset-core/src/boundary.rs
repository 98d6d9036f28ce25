//! Turns an over-fetched row batch into a page.

use crate::{Direction, Page, PageError, PageInfo};

/// Rows of one page in canonical order plus the neighbour flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window<R> {
    pub rows: Vec<R>,
    pub has_next: bool,
    pub has_previous: bool,
    /// Token the request resumed from, if any.
    pub resumed_from: Option<String>,
}

/// `rows` is what the store returned for a `limit + 1` fetch, in fetch order
/// (reversed sort order for backward requests). The extra row is dropped and
/// backward rows are put back into canonical order.
pub fn evaluate<R>(mut rows: Vec<R>, limit: u32, direction: Direction, cursor: Option<&str>) -> Window<R> {
    let limit = limit as usize;
    let had_cursor = cursor.is_some();
    let resumed_from = cursor.map(str::to_owned);
    let overflow = rows.len() > limit;
    rows.truncate(limit);

    match direction {
        Direction::Forward => Window {
            rows,
            has_next: overflow,
            has_previous: had_cursor,
            resumed_from,
        },
        Direction::Backward => {
            rows.reverse();
            Window {
                rows,
                has_next: had_cursor,
                has_previous: overflow,
                resumed_from,
            }
        }
    }
}

/// Build the page. `encode` mints a token for a boundary row; it is called for
/// the first item iff there is a previous page and for the last item iff there
/// is a next page. A resumed request that lands on no rows hands its own
/// token back on the side it came from, so the caller can still turn around.
pub fn assemble<R, F>(window: Window<R>, limit: u32, total_count: u64, mut encode: F) -> Result<Page<R>, PageError>
where
    F: FnMut(&R) -> Result<String, PageError>,
{
    if window.rows.is_empty() {
        let mut page = Page::empty(u64::from(limit), total_count);
        if window.has_previous {
            page.page_info.prev_cursor = window.resumed_from.clone();
        }
        if window.has_next {
            page.page_info.next_cursor = window.resumed_from;
        }
        return Ok(page);
    }

    let prev_cursor = match window.rows.first() {
        Some(first) if window.has_previous => Some(encode(first)?),
        _ => None,
    };
    let next_cursor = match window.rows.last() {
        Some(last) if window.has_next => Some(encode(last)?),
        _ => None,
    };

    Ok(Page::new(
        window.rows,
        PageInfo {
            next_cursor,
            prev_cursor,
            limit: u64::from(limit),
            total_count,
        },
    ))
}
