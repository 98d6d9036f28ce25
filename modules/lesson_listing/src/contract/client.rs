use async_trait::async_trait;
use keyset_core::PageRequest;

use crate::contract::{
    error::ListingError,
    model::{ListResult, StudentOccurrence},
};
use crate::domain::query::{AssignedStudentQuery, LessonListQuery, SubscriptionQuery};

/// Public API of the lesson_listing module for other modules and binaries.
#[async_trait]
pub trait LessonListingApi: Send + Sync {
    async fn list_lessons(
        &self,
        query: LessonListQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError>;

    async fn list_assigned_students(
        &self,
        query: AssignedStudentQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError>;

    async fn list_subscriptions(
        &self,
        query: SubscriptionQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError>;

    /// The recurring occurrence at a 1-based row number.
    async fn occurrence_at(
        &self,
        query: AssignedStudentQuery,
        row_number: u64,
    ) -> Result<Option<StudentOccurrence>, ListingError>;
}
