//! Relations behind each list and how filter dimensions bind to their columns.

use keyset_core::{FieldKind, SortKey};
use keyset_db::{
    FieldMap, FilterBinding, FunctionSource, Relation, RelationError, SnapshotWindow,
};
use sea_orm::DbBackend;

use crate::config::ListingConfig;
use crate::contract::model::PurchaseMethod;
use crate::domain::query::{dimension, field, LessonWindow, ListingSortKeys};

pub const LESSONS: &str = "lessons";
pub const SLOT_PACKAGES: &str = "slot_student_packages";
pub const SUBSCRIPTIONS: &str = "student_subscriptions";

/// Weekly occurrences of recurring packages within `[start_date, end_date)`.
/// Stands in for the recurring slot function on stores without one; the
/// single marker is the purchase method.
pub const RECURRING_OCCURRENCES_SQL: &str = "WITH RECURSIVE weeks(student_course_id, student_id, student_name, course_id, location_id, week_start, package_end) AS (
    SELECT student_course_id, student_id, student_name, course_id, location_id, start_date, end_date
    FROM student_course_packages
    WHERE purchase_method = ? AND start_date < end_date
    UNION ALL
    SELECT student_course_id, student_id, student_name, course_id, location_id, date(week_start, '+7 days'), package_end
    FROM weeks
    WHERE date(week_start, '+7 days') < package_end
)
SELECT student_course_id || '_' || week_start AS occurrence_id,
       student_course_id, student_id, student_name, course_id, location_id,
       week_start, date(week_start, '+7 days') AS week_end
FROM weeks";

#[derive(Debug, Clone)]
pub struct ListingRelations {
    pub lessons: Relation,
    pub slot_students: Relation,
    pub recurring_students: Relation,
    pub subscriptions: Relation,
}

impl ListingRelations {
    pub fn new(backend: DbBackend, cfg: &ListingConfig) -> Result<Self, RelationError> {
        Ok(Self {
            lessons: lessons(),
            slot_students: slot_students(cfg),
            recurring_students: recurring_students(backend, cfg)?,
            subscriptions: subscriptions(),
        })
    }

    /// Every list's sort key must resolve against its relation.
    pub fn validate(&self, keys: &ListingSortKeys) -> Result<(), RelationError> {
        for window in [LessonWindow::Future, LessonWindow::Past] {
            self.lessons.validate_sort_key(&keys.lessons(window))?;
        }
        let pairs: [(&Relation, &SortKey); 3] = [
            (
                &self.slot_students,
                keys.assigned_students(PurchaseMethod::Slot),
            ),
            (
                &self.recurring_students,
                keys.assigned_students(PurchaseMethod::Recurring),
            ),
            (&self.subscriptions, keys.subscriptions()),
        ];
        for (relation, key) in pairs {
            relation.validate_sort_key(key)?;
        }
        Ok(())
    }
}

fn lessons() -> Relation {
    Relation::table(
        LESSONS,
        FieldMap::new()
            .insert(field::START_TIME, "start_time", FieldKind::DateTimeUtc)
            .insert(field::LESSON_ID, "lesson_id", FieldKind::String),
        field::LESSON_ID,
    )
    .with_filter(dimension::LESSON_END, FilterBinding::TimeRange("end_time".into()))
    .with_filter(dimension::LESSON_START, FilterBinding::TimeRange("start_time".into()))
    .with_filter(dimension::LOCATION_IDS, FilterBinding::AnyOf("location_id".into()))
    .with_filter(dimension::TEACHER_IDS, FilterBinding::AnyOf("teacher_id".into()))
    .with_filter(dimension::COURSE_IDS, FilterBinding::AnyOf("course_id".into()))
    .with_filter(dimension::CLASS_IDS, FilterBinding::AnyOf("class_id".into()))
    .with_filter(dimension::STATUSES, FilterBinding::AnyOf("scheduling_status".into()))
    .with_filter(dimension::KEYWORD, FilterBinding::Keyword(vec!["name".into()]))
}

fn student_filters(relation: Relation, start_column: &str) -> Relation {
    relation
        .with_filter(dimension::STUDENT_IDS, FilterBinding::AnyOf("student_id".into()))
        .with_filter(dimension::COURSE_IDS, FilterBinding::AnyOf("course_id".into()))
        .with_filter(dimension::LOCATION_IDS, FilterBinding::AnyOf("location_id".into()))
        .with_filter(dimension::START_DATE, FilterBinding::DateRange(start_column.into()))
        .with_filter(dimension::KEYWORD, FilterBinding::Keyword(vec!["student_name".into()]))
}

fn slot_students(cfg: &ListingConfig) -> Relation {
    let relation = Relation::table(
        SLOT_PACKAGES,
        FieldMap::new()
            .insert(field::STUDENT_START_DATE, "start_date", FieldKind::Date)
            .insert(field::COURSE_ID, "course_id", FieldKind::String)
            .insert(field::STUDENT_ID, "student_id", FieldKind::String)
            .insert(field::STUDENT_COURSE_ID, "student_course_id", FieldKind::String),
        field::STUDENT_COURSE_ID,
    )
    .with_snapshot_window(SnapshotWindow::new("end_date", cfg.timezone));
    student_filters(relation, "start_date")
}

fn recurring_students(backend: DbBackend, cfg: &ListingConfig) -> Result<Relation, RelationError> {
    let method = PurchaseMethod::Recurring.as_str().to_string();
    let source = match backend {
        DbBackend::Postgres => FunctionSource::Call {
            name: cfg.recurring_slot_function.clone(),
            args: vec![method.into()],
        },
        _ => FunctionSource::Derived {
            sql: RECURRING_OCCURRENCES_SQL.to_string(),
            args: vec![method.into()],
        },
    };
    let relation = Relation::function(
        "recurring_occurrences",
        source,
        SnapshotWindow::new("week_end", cfg.timezone),
        FieldMap::new()
            .insert(field::WEEK_START, "week_start", FieldKind::Date)
            .insert(field::COURSE_ID, "course_id", FieldKind::String)
            .insert(field::STUDENT_ID, "student_id", FieldKind::String)
            .insert(field::OCCURRENCE_ID, "occurrence_id", FieldKind::String),
        field::OCCURRENCE_ID,
    )?;
    Ok(student_filters(relation, "week_start"))
}

fn subscriptions() -> Relation {
    Relation::table(
        SUBSCRIPTIONS,
        FieldMap::new()
            .insert(field::START_AT, "start_at", FieldKind::DateTimeUtc)
            .insert(
                field::STUDENT_SUBSCRIPTION_ID,
                "student_subscription_id",
                FieldKind::String,
            ),
        field::STUDENT_SUBSCRIPTION_ID,
    )
    .with_filter(dimension::COURSE_IDS, FilterBinding::AnyOf("course_id".into()))
    .with_filter(dimension::LOCATION_IDS, FilterBinding::AnyOf("location_id".into()))
    .with_filter(dimension::GRADES, FilterBinding::AnyOf("grade".into()))
    .with_filter(dimension::CLASS_IDS, FilterBinding::AnyOf("class_id".into()))
    .with_filter(dimension::KEYWORD, FilterBinding::Keyword(vec!["student_name".into()]))
    .with_filter(
        dimension::LESSON_DATE,
        FilterBinding::Overlaps {
            start: "start_at".into(),
            end: "end_at".into(),
        },
    )
}
