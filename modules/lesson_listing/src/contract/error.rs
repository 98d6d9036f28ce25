use keyset_core::PageError;
use thiserror::Error;

/// Errors that are safe to expose to other modules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid cursor: {message}")]
    InvalidCursor { message: String },

    #[error("Limit {requested} is out of range 1..={max}")]
    LimitOutOfRange { requested: u32, max: u32 },

    #[error("Internal error")]
    Internal,
}

impl ListingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}

impl From<PageError> for ListingError {
    fn from(e: PageError) -> Self {
        match e {
            PageError::InvalidFilter(msg) => Self::validation(msg),
            PageError::InvalidCursor(cause) => Self::InvalidCursor {
                message: cause.to_string(),
            },
            PageError::LimitOutOfRange { requested, max } => {
                Self::LimitOutOfRange { requested, max }
            }
            PageError::BackingStore(_) => Self::internal(),
        }
    }
}
