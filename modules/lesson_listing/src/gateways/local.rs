use async_trait::async_trait;
use keyset_core::PageRequest;
use std::sync::Arc;

use crate::contract::{
    client::LessonListingApi,
    error::ListingError,
    model::{ListResult, StudentOccurrence},
};
use crate::domain::query::{AssignedStudentQuery, LessonListQuery, SubscriptionQuery};
use crate::domain::service::Service;

/// In-process implementation of `LessonListingApi` delegating to the domain service.
pub struct LessonListingLocalClient {
    service: Arc<Service>,
}

impl LessonListingLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LessonListingApi for LessonListingLocalClient {
    async fn list_lessons(
        &self,
        query: LessonListQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        self.service.list_lessons(&query, page).await
    }

    async fn list_assigned_students(
        &self,
        query: AssignedStudentQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        self.service.list_assigned_students(&query, page).await
    }

    async fn list_subscriptions(
        &self,
        query: SubscriptionQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        self.service.list_subscriptions(&query, page).await
    }

    async fn occurrence_at(
        &self,
        query: AssignedStudentQuery,
        row_number: u64,
    ) -> Result<Option<StudentOccurrence>, ListingError> {
        self.service.occurrence_at(&query, row_number).await
    }
}
