//! SeaORM-backed repository implementation for the domain port.
//!
//! Generic over `C: ConnectionTrait`, so it runs on a `DatabaseConnection` or
//! inside a transaction. Every list goes through `keyset_db::PageExecutor`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyset_core::{FilterSet, Page, PageError, SortKey};
use keyset_db::PageExecutor;
use sea_orm::ConnectionTrait;

use crate::contract::model::{AssignedStudent, Lesson, StudentOccurrence, StudentSubscription};
use crate::domain::repo::{ListSpec, ListingRepository};
use crate::infra::storage::relations::ListingRelations;
use crate::infra::storage::rows::{LessonRow, OccurrenceRow, PackageRow, SubscriptionRow};

pub struct SeaOrmListingRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
    relations: ListingRelations,
}

impl<C> SeaOrmListingRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C, relations: ListingRelations) -> Self {
        Self { conn, relations }
    }

    fn executor(&self) -> PageExecutor<'_, C> {
        PageExecutor::new(&self.conn)
    }
}

fn try_map_page<R, T>(
    page: Page<R>,
    f: impl Fn(R) -> Result<T, PageError>,
) -> Result<Page<T>, PageError> {
    let Page { items, page_info } = page;
    let items = items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, page_info))
}

#[async_trait]
impl<C> ListingRepository for SeaOrmListingRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn lessons_page(&self, spec: &ListSpec) -> Result<Page<Lesson>, PageError> {
        let page: Page<LessonRow> = self
            .executor()
            .fetch_page(
                &self.relations.lessons,
                &spec.sort_key,
                &spec.filters,
                &spec.request,
                &spec.limits,
            )
            .await?;
        try_map_page(page, Lesson::try_from)
    }

    async fn slot_students_page(
        &self,
        spec: &ListSpec,
    ) -> Result<Page<AssignedStudent>, PageError> {
        let page: Page<PackageRow> = self
            .executor()
            .fetch_page(
                &self.relations.slot_students,
                &spec.sort_key,
                &spec.filters,
                &spec.request,
                &spec.limits,
            )
            .await?;
        Ok(page.map_items(Into::into))
    }

    async fn recurring_students_page(
        &self,
        spec: &ListSpec,
    ) -> Result<Page<StudentOccurrence>, PageError> {
        let page: Page<OccurrenceRow> = self
            .executor()
            .fetch_page(
                &self.relations.recurring_students,
                &spec.sort_key,
                &spec.filters,
                &spec.request,
                &spec.limits,
            )
            .await?;
        Ok(page.map_items(Into::into))
    }

    async fn subscriptions_page(
        &self,
        spec: &ListSpec,
    ) -> Result<Page<StudentSubscription>, PageError> {
        let page: Page<SubscriptionRow> = self
            .executor()
            .fetch_page(
                &self.relations.subscriptions,
                &spec.sort_key,
                &spec.filters,
                &spec.request,
                &spec.limits,
            )
            .await?;
        Ok(page.map_items(Into::into))
    }

    async fn occurrence_at(
        &self,
        filters: &FilterSet,
        sort_key: &SortKey,
        snapshot: DateTime<Utc>,
        row_number: u64,
    ) -> Result<Option<StudentOccurrence>, PageError> {
        let row: Option<OccurrenceRow> = self
            .executor()
            .lookup_ordinal(
                &self.relations.recurring_students,
                sort_key,
                filters,
                snapshot,
                row_number,
            )
            .await?;
        Ok(row.map(Into::into))
    }
}
