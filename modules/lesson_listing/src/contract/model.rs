use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use keyset_core::{Page, PageInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Draft,
    Published,
    Completed,
    Canceled,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Draft => "draft",
            LessonStatus::Published => "published",
            LessonStatus::Completed => "completed",
            LessonStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(LessonStatus::Draft),
            "published" => Ok(LessonStatus::Published),
            "completed" => Ok(LessonStatus::Completed),
            "canceled" | "cancelled" => Ok(LessonStatus::Canceled),
            other => Err(format!("unknown lesson status '{other}'")),
        }
    }
}

/// How a student bought a course package. Decides which relation lists them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMethod {
    #[default]
    Slot,
    Recurring,
}

impl PurchaseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseMethod::Slot => "slot",
            PurchaseMethod::Recurring => "recurring",
        }
    }
}

impl FromStr for PurchaseMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slot" => Ok(PurchaseMethod::Slot),
            "recurring" => Ok(PurchaseMethod::Recurring),
            other => Err(format!("unknown purchase method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_id: String,
    pub name: String,
    pub location_id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub class_id: Option<String>,
    pub status: LessonStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A slot-purchased course package assigned to a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedStudent {
    pub student_course_id: String,
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub location_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One week of a recurring package.
///
/// `occurrence_id` is `<student_course_id>_<week_start>`; it identifies the row
/// for display only and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentOccurrence {
    pub occurrence_id: String,
    pub student_course_id: String,
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub location_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSubscription {
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

/// A page of one list query, tagged by what was listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum ListResult {
    Lessons(Page<Lesson>),
    SlotStudents(Page<AssignedStudent>),
    RecurringStudents(Page<StudentOccurrence>),
    Subscriptions(Page<StudentSubscription>),
}

impl ListResult {
    pub fn page_info(&self) -> &PageInfo {
        match self {
            ListResult::Lessons(p) => &p.page_info,
            ListResult::SlotStudents(p) => &p.page_info,
            ListResult::RecurringStudents(p) => &p.page_info,
            ListResult::Subscriptions(p) => &p.page_info,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListResult::Lessons(p) => p.len(),
            ListResult::SlotStudents(p) => p.len(),
            ListResult::RecurringStudents(p) => p.len(),
            ListResult::Subscriptions(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
