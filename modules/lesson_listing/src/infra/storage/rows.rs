//! Row shapes read from the relations and their mapping into contract models.

use chrono::{DateTime, NaiveDate, Utc};
use keyset_core::PageError;
use sea_orm::FromQueryResult;

use crate::contract::model::{
    AssignedStudent, Lesson, LessonStatus, StudentOccurrence, StudentSubscription,
};

#[derive(Debug, Clone, FromQueryResult)]
pub struct LessonRow {
    pub lesson_id: String,
    pub name: String,
    pub location_id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub class_id: Option<String>,
    pub scheduling_status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TryFrom<LessonRow> for Lesson {
    type Error = PageError;

    fn try_from(r: LessonRow) -> Result<Self, Self::Error> {
        let status = r
            .scheduling_status
            .parse::<LessonStatus>()
            .map_err(|e| PageError::backing_store(format!("lesson {}: {e}", r.lesson_id)))?;
        Ok(Lesson {
            lesson_id: r.lesson_id,
            name: r.name,
            location_id: r.location_id,
            teacher_id: r.teacher_id,
            course_id: r.course_id,
            class_id: r.class_id,
            status,
            start_time: r.start_time,
            end_time: r.end_time,
        })
    }
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct PackageRow {
    pub student_course_id: String,
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub location_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<PackageRow> for AssignedStudent {
    fn from(r: PackageRow) -> Self {
        AssignedStudent {
            student_course_id: r.student_course_id,
            student_id: r.student_id,
            student_name: r.student_name,
            course_id: r.course_id,
            location_id: r.location_id,
            start_date: r.start_date,
            end_date: r.end_date,
        }
    }
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct OccurrenceRow {
    pub occurrence_id: String,
    pub student_course_id: String,
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub location_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

impl From<OccurrenceRow> for StudentOccurrence {
    fn from(r: OccurrenceRow) -> Self {
        StudentOccurrence {
            occurrence_id: r.occurrence_id,
            student_course_id: r.student_course_id,
            student_id: r.student_id,
            student_name: r.student_name,
            course_id: r.course_id,
            location_id: r.location_id,
            week_start: r.week_start,
            week_end: r.week_end,
        }
    }
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct SubscriptionRow {
    pub student_subscription_id: String,
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub location_id: String,
    pub grade: String,
    pub class_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for StudentSubscription {
    fn from(r: SubscriptionRow) -> Self {
        StudentSubscription {
            student_subscription_id: r.student_subscription_id,
            student_id: r.student_id,
            student_name: r.student_name,
            course_id: r.course_id,
            location_id: r.location_id,
            grade: r.grade,
            class_id: r.class_id,
            start_at: r.start_at,
            end_at: r.end_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lesson_row(status: &str) -> LessonRow {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        LessonRow {
            lesson_id: "l-1".into(),
            name: "Algebra".into(),
            location_id: "loc-1".into(),
            teacher_id: "t-1".into(),
            course_id: "c-1".into(),
            class_id: None,
            scheduling_status: status.into(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(45),
        }
    }

    #[test]
    fn lesson_status_is_parsed() {
        let lesson = Lesson::try_from(lesson_row("published")).unwrap();
        assert_eq!(lesson.status, LessonStatus::Published);
    }

    #[test]
    fn unknown_status_is_a_store_error() {
        let err = Lesson::try_from(lesson_row("archived")).unwrap_err();
        assert!(matches!(err, PageError::BackingStore(msg) if msg.contains("l-1")));
    }
}
