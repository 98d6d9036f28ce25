use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DbBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

const SLOT_VIEW_SQL: &str = "CREATE VIEW slot_student_packages AS
SELECT student_course_id, student_id, student_name, course_id, location_id, start_date, end_date
FROM student_course_packages
WHERE purchase_method = 'slot'";

/// One row per week of every package bought with `purchase_method`.
const RECURRING_FN_SQL: &str = "CREATE OR REPLACE FUNCTION recurring_slot_occurrences(p_purchase_method text)
RETURNS TABLE (
    occurrence_id text,
    student_course_id text,
    student_id text,
    student_name text,
    course_id text,
    location_id text,
    week_start date,
    week_end date
)
LANGUAGE sql STABLE AS $$
    SELECT p.student_course_id || '_' || to_char(w.d, 'YYYY-MM-DD'),
           p.student_course_id, p.student_id, p.student_name, p.course_id, p.location_id,
           w.d::date, (w.d + interval '7 days')::date
    FROM student_course_packages p
    CROSS JOIN LATERAL generate_series(p.start_date::timestamp, (p.end_date - 1)::timestamp, interval '7 days') AS w(d)
    WHERE p.purchase_method = p_purchase_method
$$";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lessons::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Lessons::LessonId).string().not_null().primary_key())
                    .col(ColumnDef::new(Lessons::Name).string().not_null())
                    .col(ColumnDef::new(Lessons::LocationId).string().not_null())
                    .col(ColumnDef::new(Lessons::TeacherId).string().not_null())
                    .col(ColumnDef::new(Lessons::CourseId).string().not_null())
                    .col(ColumnDef::new(Lessons::ClassId).string().null())
                    .col(ColumnDef::new(Lessons::SchedulingStatus).string().not_null())
                    .col(ColumnDef::new(Lessons::StartTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Lessons::EndTime).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_lessons_start_time_lesson_id")
                    .table(Lessons::Table)
                    .col(Lessons::StartTime)
                    .col(Lessons::LessonId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StudentCoursePackages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentCoursePackages::StudentCourseId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StudentCoursePackages::StudentId).string().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::StudentName).string().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::CourseId).string().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::LocationId).string().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::PurchaseMethod).string().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::StartDate).date().not_null())
                    .col(ColumnDef::new(StudentCoursePackages::EndDate).date().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_packages_method_start")
                    .table(StudentCoursePackages::Table)
                    .col(StudentCoursePackages::PurchaseMethod)
                    .col(StudentCoursePackages::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StudentSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentSubscriptions::StudentSubscriptionId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StudentSubscriptions::StudentId).string().not_null())
                    .col(ColumnDef::new(StudentSubscriptions::StudentName).string().not_null())
                    .col(ColumnDef::new(StudentSubscriptions::CourseId).string().not_null())
                    .col(ColumnDef::new(StudentSubscriptions::LocationId).string().not_null())
                    .col(ColumnDef::new(StudentSubscriptions::Grade).string().not_null())
                    .col(ColumnDef::new(StudentSubscriptions::ClassId).string().null())
                    .col(
                        ColumnDef::new(StudentSubscriptions::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentSubscriptions::EndAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_start_at_id")
                    .table(StudentSubscriptions::Table)
                    .col(StudentSubscriptions::StartAt)
                    .col(StudentSubscriptions::StudentSubscriptionId)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(SLOT_VIEW_SQL).await?;
        if manager.get_database_backend() == DbBackend::Postgres {
            db.execute_unprepared(RECURRING_FN_SQL).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        if manager.get_database_backend() == DbBackend::Postgres {
            db.execute_unprepared("DROP FUNCTION IF EXISTS recurring_slot_occurrences(text)")
                .await?;
        }
        db.execute_unprepared("DROP VIEW IF EXISTS slot_student_packages")
            .await?;
        manager
            .drop_table(Table::drop().table(StudentSubscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StudentCoursePackages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lessons::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Lessons {
    Table,
    LessonId,
    Name,
    LocationId,
    TeacherId,
    CourseId,
    ClassId,
    SchedulingStatus,
    StartTime,
    EndTime,
}

#[derive(DeriveIden)]
enum StudentCoursePackages {
    Table,
    StudentCourseId,
    StudentId,
    StudentName,
    CourseId,
    LocationId,
    PurchaseMethod,
    StartDate,
    EndDate,
}

#[derive(DeriveIden)]
enum StudentSubscriptions {
    Table,
    StudentSubscriptionId,
    StudentId,
    StudentName,
    CourseId,
    LocationId,
    Grade,
    ClassId,
    StartAt,
    EndAt,
}
