use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyset_core::{FilterSet, LimitCfg, Page, PageError, PageRequest, SortKey};

use crate::contract::model::{AssignedStudent, Lesson, StudentOccurrence, StudentSubscription};

/// Everything a repository needs to fetch one page.
#[derive(Debug, Clone)]
pub struct ListSpec {
    pub filters: FilterSet,
    pub sort_key: SortKey,
    pub request: PageRequest,
    pub limits: LimitCfg,
}

/// Port for the domain layer: read-only list queries.
/// Object-safe and async-friendly via `async_trait`.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn lessons_page(&self, spec: &ListSpec) -> Result<Page<Lesson>, PageError>;

    async fn slot_students_page(&self, spec: &ListSpec)
        -> Result<Page<AssignedStudent>, PageError>;

    async fn recurring_students_page(
        &self,
        spec: &ListSpec,
    ) -> Result<Page<StudentOccurrence>, PageError>;

    async fn subscriptions_page(
        &self,
        spec: &ListSpec,
    ) -> Result<Page<StudentSubscription>, PageError>;

    /// Recurring occurrence at a 1-based row number under the given filters.
    async fn occurrence_at(
        &self,
        filters: &FilterSet,
        sort_key: &SortKey,
        snapshot: DateTime<Utc>,
        row_number: u64,
    ) -> Result<Option<StudentOccurrence>, PageError>;
}
