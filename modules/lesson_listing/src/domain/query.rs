//! Turns caller filters into a `FilterSet` and picks the sort key for each list.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use keyset_core::{
    FieldKind, FilterSet, SortDir, SortKey, SortKeyError, SortKeyStrategy, TimeWindow,
};
use serde::{Deserialize, Serialize};

use crate::contract::model::{LessonStatus, PurchaseMethod};

/// Filter dimension names shared with the storage relations.
pub mod dimension {
    pub const LESSON_END: &str = "lesson_end";
    pub const LESSON_START: &str = "lesson_start";
    pub const LESSON_DATE: &str = "lesson_date";
    pub const START_DATE: &str = "start_date";
    pub const LOCATION_IDS: &str = "location_ids";
    pub const TEACHER_IDS: &str = "teacher_ids";
    pub const COURSE_IDS: &str = "course_ids";
    pub const CLASS_IDS: &str = "class_ids";
    pub const STUDENT_IDS: &str = "student_ids";
    pub const STATUSES: &str = "statuses";
    pub const GRADES: &str = "grades";
    pub const KEYWORD: &str = "keyword";
}

/// Sort fields, named as the relations expose them.
pub mod field {
    pub const START_TIME: &str = "start_time";
    pub const LESSON_ID: &str = "lesson_id";
    pub const STUDENT_START_DATE: &str = "student_start_date";
    pub const WEEK_START: &str = "week_start";
    pub const COURSE_ID: &str = "course_id";
    pub const STUDENT_ID: &str = "student_id";
    pub const STUDENT_COURSE_ID: &str = "student_course_id";
    pub const OCCURRENCE_ID: &str = "occurrence_id";
    pub const START_AT: &str = "start_at";
    pub const STUDENT_SUBSCRIPTION_ID: &str = "student_subscription_id";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonWindow {
    Past,
    #[default]
    Future,
}

impl From<LessonWindow> for TimeWindow {
    fn from(w: LessonWindow) -> Self {
        match w {
            LessonWindow::Past => TimeWindow::Past,
            LessonWindow::Future => TimeWindow::Upcoming,
        }
    }
}

/// Sort keys of every list, built and checked once.
#[derive(Debug, Clone)]
pub struct ListingSortKeys {
    lessons: SortKeyStrategy,
    slot_students: SortKey,
    recurring_students: SortKey,
    subscriptions: SortKey,
}

impl ListingSortKeys {
    pub fn new() -> Result<Self, SortKeyError> {
        use field::*;

        let lessons = SortKeyStrategy::new(
            vec![(START_TIME, SortDir::Asc, FieldKind::DateTimeUtc)],
            (LESSON_ID, FieldKind::String),
        )?;
        let slot_students = SortKeyStrategy::new(
            vec![
                (STUDENT_START_DATE, SortDir::Asc, FieldKind::Date),
                (COURSE_ID, SortDir::Asc, FieldKind::String),
                (STUDENT_ID, SortDir::Asc, FieldKind::String),
            ],
            (STUDENT_COURSE_ID, FieldKind::String),
        )?
        .resolve(TimeWindow::Upcoming);
        let recurring_students = SortKeyStrategy::new(
            vec![
                (WEEK_START, SortDir::Asc, FieldKind::Date),
                (COURSE_ID, SortDir::Asc, FieldKind::String),
                (STUDENT_ID, SortDir::Asc, FieldKind::String),
            ],
            (OCCURRENCE_ID, FieldKind::String),
        )?
        .resolve(TimeWindow::Upcoming);
        let subscriptions = SortKeyStrategy::new(
            vec![(START_AT, SortDir::Asc, FieldKind::DateTimeUtc)],
            (STUDENT_SUBSCRIPTION_ID, FieldKind::String),
        )?
        .resolve(TimeWindow::Upcoming);

        Ok(Self {
            lessons,
            slot_students,
            recurring_students,
            subscriptions,
        })
    }

    pub fn lessons(&self, window: LessonWindow) -> SortKey {
        self.lessons.resolve(window.into())
    }

    pub fn assigned_students(&self, method: PurchaseMethod) -> &SortKey {
        match method {
            PurchaseMethod::Slot => &self.slot_students,
            PurchaseMethod::Recurring => &self.recurring_students,
        }
    }

    pub fn subscriptions(&self) -> &SortKey {
        &self.subscriptions
    }
}

/// Lessons list. `current_time` splits past from future lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonListQuery {
    pub window: LessonWindow,
    pub current_time: DateTime<Utc>,
    /// Inclusive calendar dates of the lesson start, in the listing zone.
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub location_ids: Vec<String>,
    pub teacher_ids: Vec<String>,
    pub course_ids: Vec<String>,
    pub class_ids: Vec<String>,
    pub statuses: Vec<LessonStatus>,
    pub keyword: Option<String>,
}

impl LessonListQuery {
    pub fn new(window: LessonWindow, current_time: DateTime<Utc>) -> Self {
        Self {
            window,
            current_time,
            from_date: None,
            to_date: None,
            location_ids: Vec::new(),
            teacher_ids: Vec::new(),
            course_ids: Vec::new(),
            class_ids: Vec::new(),
            statuses: Vec::new(),
            keyword: None,
        }
    }

    pub fn filter_set(&self, tz: Tz) -> FilterSet {
        use dimension::*;

        let (from, to) = match self.window {
            LessonWindow::Future => (Some(self.current_time), None),
            LessonWindow::Past => (None, Some(self.current_time)),
        };
        let (start_from, start_to) = day_bounds(self.from_date, self.to_date, tz);

        FilterSet::new()
            .with_time_range(LESSON_END, from, to)
            .with_time_range(LESSON_START, start_from, start_to)
            .with_any_of(LOCATION_IDS, self.location_ids.iter().cloned())
            .with_any_of(TEACHER_IDS, self.teacher_ids.iter().cloned())
            .with_any_of(COURSE_IDS, self.course_ids.iter().cloned())
            .with_any_of(CLASS_IDS, self.class_ids.iter().cloned())
            .with_any_of(STATUSES, self.statuses.iter().map(LessonStatus::as_str))
            .with_keyword(KEYWORD, self.keyword.clone().unwrap_or_default())
            // callers send a fresh clock with every page request
            .floating(LESSON_END)
    }
}

/// Students assigned to courses, listed per purchase method as of `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedStudentQuery {
    pub purchase_method: PurchaseMethod,
    pub snapshot: DateTime<Utc>,
    pub student_ids: Vec<String>,
    pub course_ids: Vec<String>,
    pub location_ids: Vec<String>,
    /// Inclusive range on the package start (slot) or week start (recurring).
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub keyword: Option<String>,
}

impl AssignedStudentQuery {
    pub fn new(purchase_method: PurchaseMethod, snapshot: DateTime<Utc>) -> Self {
        Self {
            purchase_method,
            snapshot,
            student_ids: Vec::new(),
            course_ids: Vec::new(),
            location_ids: Vec::new(),
            from_date: None,
            to_date: None,
            keyword: None,
        }
    }

    pub fn filter_set(&self) -> FilterSet {
        use dimension::*;

        FilterSet::new()
            .with_any_of(STUDENT_IDS, self.student_ids.iter().cloned())
            .with_any_of(COURSE_IDS, self.course_ids.iter().cloned())
            .with_any_of(LOCATION_IDS, self.location_ids.iter().cloned())
            .with_date_range(START_DATE, self.from_date, self.to_date)
            .with_keyword(KEYWORD, self.keyword.clone().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub course_ids: Vec<String>,
    pub location_ids: Vec<String>,
    pub grades: Vec<String>,
    pub class_ids: Vec<String>,
    pub keyword: Option<String>,
    /// Keep subscriptions active at some point of this calendar date.
    pub lesson_date: Option<NaiveDate>,
}

impl SubscriptionQuery {
    pub fn filter_set(&self, tz: Tz) -> FilterSet {
        use dimension::*;

        let (from, to) = day_bounds(self.lesson_date, self.lesson_date, tz);
        FilterSet::new()
            .with_any_of(COURSE_IDS, self.course_ids.iter().cloned())
            .with_any_of(LOCATION_IDS, self.location_ids.iter().cloned())
            .with_any_of(GRADES, self.grades.iter().cloned())
            .with_any_of(CLASS_IDS, self.class_ids.iter().cloned())
            .with_keyword(KEYWORD, self.keyword.clone().unwrap_or_default())
            .with_time_range(LESSON_DATE, from, to)
    }
}

/// Instants `[start of from, start of the day after to)` in `tz`.
fn day_bounds(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    tz: Tz,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start = from.map(|d| day_start(d, tz));
    let end = to.and_then(|d| d.succ_opt()).map(|d| day_start(d, tz));
    (start, end)
}

fn day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&local).earliest() {
        Some(t) => t.with_timezone(&Utc),
        // midnight skipped by a DST jump
        None => Utc.from_utc_datetime(&local),
    }
}
