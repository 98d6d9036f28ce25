use thiserror::Error;

/// Why a page token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64url")]
    InvalidBase64,

    #[error("cursor payload is not valid json")]
    InvalidJson,

    #[error("unsupported cursor version")]
    InvalidVersion,

    #[error("cursor carries no keys")]
    InvalidKeys,

    #[error("cursor carries no sort fields")]
    InvalidFields,

    #[error("cursor ordinal must be between 1 and 2^63-1")]
    InvalidOrdinal,

    #[error("cursor was produced for sort key '{cursor}', active sort key is '{active}'")]
    SortKeyMismatch { cursor: String, active: String },

    #[error("cursor was produced under a different filter set")]
    FilterMismatch,

    #[error("cursor was produced for snapshot date {cursor}, request uses {active}")]
    SnapshotMismatch { cursor: String, active: String },

    #[error("cursor key count {got} does not match sort key arity {expected}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("cursor value '{got}' is not a valid {expected}")]
    KindMismatch { expected: &'static str, got: String },

    #[error("{0} cursor cannot be used against this relation")]
    WrongVariant(&'static str),
}

/// Configuration-time sort key errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SortKeyError {
    #[error("sort key is empty")]
    Empty,

    #[error("sort key must end with the unique tie-break field '{0}'")]
    MissingTiebreaker(String),

    #[error("field '{0}' appears more than once in the sort key")]
    DuplicateField(String),

    #[error("unknown sort field: {0}")]
    UnknownField(String),

    #[error("invalid signed sort token: {0}")]
    InvalidToken(String),
}

/// Failure taxonomy of a page request.
///
/// None of these is ever turned into an empty page: an empty page means
/// "end of data".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    #[error("backing store error: {0}")]
    BackingStore(String),

    #[error("limit {requested} out of range (1..={max})")]
    LimitOutOfRange { requested: u32, max: u32 },
}

impl PageError {
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }

    pub fn backing_store(message: impl std::fmt::Display) -> Self {
        Self::BackingStore(message.to_string())
    }
}
