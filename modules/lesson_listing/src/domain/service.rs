use std::sync::Arc;

use chrono_tz::Tz;
use keyset_core::{LimitCfg, PageRequest};
use tracing::{debug, instrument};

use crate::contract::error::ListingError;
use crate::contract::model::{ListResult, PurchaseMethod, StudentOccurrence};
use crate::domain::query::{
    AssignedStudentQuery, LessonListQuery, ListingSortKeys, SubscriptionQuery,
};
use crate::domain::repo::{ListSpec, ListingRepository};

/// Domain service: builds filters and the sort key for each list and hands them
/// to the repository port.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn ListingRepository>,
    keys: Arc<ListingSortKeys>,
    config: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub limits: LimitCfg,
    pub timezone: Tz,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: LimitCfg::default(),
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
        }
    }
}

impl Service {
    pub fn new(
        repo: Arc<dyn ListingRepository>,
        keys: Arc<ListingSortKeys>,
        config: ServiceConfig,
    ) -> Self {
        Self { repo, keys, config }
    }

    #[instrument(
        name = "lesson_listing.service.list_lessons",
        skip(self, query, page),
        fields(window = ?query.window, limit = ?page.limit, direction = ?page.direction)
    )]
    pub async fn list_lessons(
        &self,
        query: &LessonListQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        debug!("Listing lessons");
        let spec = ListSpec {
            filters: query.filter_set(self.config.timezone),
            sort_key: self.keys.lessons(query.window),
            request: page,
            limits: self.config.limits,
        };
        let page = self.repo.lessons_page(&spec).await?;
        debug!(
            returned = page.len(),
            total = page.page_info.total_count,
            "Listed lessons"
        );
        Ok(ListResult::Lessons(page))
    }

    #[instrument(
        name = "lesson_listing.service.list_assigned_students",
        skip(self, query, page),
        fields(
            purchase_method = query.purchase_method.as_str(),
            snapshot = %query.snapshot,
            limit = ?page.limit
        )
    )]
    pub async fn list_assigned_students(
        &self,
        query: &AssignedStudentQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        debug!("Listing assigned students");
        let spec = ListSpec {
            filters: query.filter_set(),
            sort_key: self.keys.assigned_students(query.purchase_method).clone(),
            request: page.at(query.snapshot),
            limits: self.config.limits,
        };
        let result = match query.purchase_method {
            PurchaseMethod::Slot => ListResult::SlotStudents(self.repo.slot_students_page(&spec).await?),
            PurchaseMethod::Recurring => {
                ListResult::RecurringStudents(self.repo.recurring_students_page(&spec).await?)
            }
        };
        debug!(
            returned = result.len(),
            total = result.page_info().total_count,
            "Listed assigned students"
        );
        Ok(result)
    }

    #[instrument(
        name = "lesson_listing.service.list_subscriptions",
        skip(self, query, page),
        fields(limit = ?page.limit)
    )]
    pub async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
        page: PageRequest,
    ) -> Result<ListResult, ListingError> {
        debug!("Listing student subscriptions");
        let spec = ListSpec {
            filters: query.filter_set(self.config.timezone),
            sort_key: self.keys.subscriptions().clone(),
            request: page,
            limits: self.config.limits,
        };
        let page = self.repo.subscriptions_page(&spec).await?;
        debug!(
            returned = page.len(),
            total = page.page_info.total_count,
            "Listed subscriptions"
        );
        Ok(ListResult::Subscriptions(page))
    }

    #[instrument(
        name = "lesson_listing.service.occurrence_at",
        skip(self, query),
        fields(row_number = row_number, snapshot = %query.snapshot)
    )]
    pub async fn occurrence_at(
        &self,
        query: &AssignedStudentQuery,
        row_number: u64,
    ) -> Result<Option<StudentOccurrence>, ListingError> {
        if query.purchase_method != PurchaseMethod::Recurring {
            return Err(ListingError::validation(
                "row numbers exist only for the recurring purchase method",
            ));
        }
        let found = self
            .repo
            .occurrence_at(
                &query.filter_set(),
                self.keys.assigned_students(PurchaseMethod::Recurring),
                query.snapshot,
                row_number,
            )
            .await?;
        debug!(found = found.is_some(), "Looked up occurrence");
        Ok(found)
    }
}
