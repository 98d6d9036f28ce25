use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PageError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// One page request. The snapshot instant is required by function-backed
/// relations and ignored by table-backed ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub direction: Direction,
    pub snapshot: Option<DateTime<Utc>>,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn backward(mut self) -> Self {
        self.direction = Direction::Backward;
        self
    }

    pub fn at(mut self, snapshot: DateTime<Utc>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Blank cursor strings count as absent.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub limit: u64,
    pub total_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Create a new page with items and page info
    pub fn new(items: Vec<T>, page_info: PageInfo) -> Self {
        Self { items, page_info }
    }

    /// Empty result: both cursors are null
    pub fn empty(limit: u64, total_count: u64) -> Self {
        Self {
            items: Vec::new(),
            page_info: PageInfo {
                next_cursor: None,
                prev_cursor: None,
                limit,
                total_count,
            },
        }
    }

    /// Map items while preserving page_info (row -> DTO mapping convenience)
    pub fn map_items<U>(self, mut f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(&mut f).collect(),
            page_info: self.page_info,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Reject limits above `max` with `LimitOutOfRange`.
    #[default]
    Reject,
    /// Clamp limits above `max` down to `max`.
    Clamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCfg {
    pub default: u32,
    pub max: u32,
    #[serde(default)]
    pub policy: LimitPolicy,
}

impl Default for LimitCfg {
    fn default() -> Self {
        Self {
            default: 25,
            max: 1000,
            policy: LimitPolicy::Reject,
        }
    }
}

impl LimitCfg {
    /// Effective limit for a request. Zero is always rejected.
    pub fn resolve(&self, requested: Option<u32>) -> Result<u32, PageError> {
        let requested = requested.unwrap_or(self.default);
        if requested == 0 {
            return Err(PageError::LimitOutOfRange {
                requested,
                max: self.max,
            });
        }
        if requested <= self.max {
            return Ok(requested);
        }
        match self.policy {
            LimitPolicy::Reject => Err(PageError::LimitOutOfRange {
                requested,
                max: self.max,
            }),
            LimitPolicy::Clamp => {
                tracing::warn!(requested, max = self.max, "page limit clamped");
                Ok(self.max)
            }
        }
    }
}
