//! Store-agnostic keyset pagination: sort keys, filter sets, page tokens and
//! page assembly.

pub mod boundary;
pub mod cursor;
mod error;
pub mod filter;
pub mod page;
pub mod sort;
mod value;

pub use boundary::{assemble, evaluate, Window};
pub use cursor::{base64_url, CursorCodec, Resume};
pub use error::{CursorError, PageError, SortKeyError};
pub use filter::{DimensionKind, FilterSet, FilterValue};
pub use page::{Direction, LimitCfg, LimitPolicy, Page, PageInfo, PageRequest};
pub use sort::{parse_signature, SortDir, SortField, SortKey, SortKeyStrategy, TimeWindow};
pub use value::{FieldKind, KeyValue};

#[cfg(test)]
mod tests;
