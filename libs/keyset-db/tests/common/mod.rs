#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use keyset_core::{FieldKind, SortDir, SortKey, SortKeyStrategy, TimeWindow};
use keyset_db::{
    FieldMap, FilterBinding, FunctionSource, Relation, SnapshotWindow,
};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, FromQueryResult, Statement, Value,
};

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct LessonRow {
    pub lesson_id: String,
    pub name: String,
    pub teacher_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct OccurrenceRow {
    pub occurrence_id: String,
    pub student_course_id: String,
    pub student_id: String,
    pub course_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");
    db.execute_unprepared(
        "CREATE TABLE lessons (
            lesson_id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL
        );
        CREATE TABLE student_course_packages (
            student_course_id TEXT PRIMARY KEY NOT NULL,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            purchase_method TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL
        );",
    )
    .await
    .expect("Failed to create schema");
    db
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
}

/// 22 lessons, three per start hour, ids deliberately not in start order.
pub async fn seed_lessons(db: &DatabaseConnection) -> Vec<LessonRow> {
    let mut rows = Vec::new();
    for i in 0..22i64 {
        let start = base_time() + Duration::hours(i / 3);
        let row = LessonRow {
            lesson_id: format!("lesson-{:02}", (i * 7) % 22),
            name: if i % 2 == 0 {
                format!("Algebra {i}")
            } else {
                format!("Biology {i}")
            },
            teacher_id: format!("t{}", i % 3),
            start_time: start,
            end_time: start + Duration::minutes(45),
        };
        insert_lesson(db, &row).await;
        rows.push(row);
    }
    rows.sort_by(|a, b| {
        (a.start_time, &a.lesson_id).cmp(&(b.start_time, &b.lesson_id))
    });
    rows
}

pub async fn insert_lesson(db: &DatabaseConnection, row: &LessonRow) {
    let values: Vec<Value> = vec![
        row.lesson_id.clone().into(),
        row.name.clone().into(),
        row.teacher_id.clone().into(),
        row.start_time.into(),
        row.end_time.into(),
    ];
    db.execute(Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO lessons (lesson_id, name, teacher_id, start_time, end_time) VALUES (?, ?, ?, ?, ?)",
        values,
    ))
    .await
    .expect("insert lesson");
}

pub fn lesson_relation() -> Relation {
    Relation::table(
        "lessons",
        FieldMap::new()
            .insert("start_time", "start_time", FieldKind::DateTimeUtc)
            .insert("lesson_id", "lesson_id", FieldKind::String),
        "lesson_id",
    )
    .with_filter("teacher_ids", FilterBinding::AnyOf("teacher_id".into()))
    .with_filter("lesson_end", FilterBinding::TimeRange("end_time".into()))
    .with_filter("keyword", FilterBinding::Keyword(vec!["name".into()]))
}

pub fn lesson_strategy() -> SortKeyStrategy {
    SortKeyStrategy::new(
        vec![("start_time", SortDir::Asc, FieldKind::DateTimeUtc)],
        ("lesson_id", FieldKind::String),
    )
    .unwrap()
}

pub fn upcoming_lessons() -> SortKey {
    lesson_strategy().resolve(TimeWindow::Upcoming)
}

/// (student_course_id, student_id, course_id, start_date); each package spans 8 weeks.
pub const PACKAGES: [(&str, &str, &str, &str); 5] = [
    ("scp-1", "s1", "c1", "2024-01-01"),
    ("scp-2", "s2", "c1", "2024-01-01"),
    ("scp-3", "s1", "c2", "2024-01-02"),
    ("scp-4", "s3", "c2", "2024-01-01"),
    ("scp-5", "s2", "c2", "2024-01-03"),
];

pub async fn seed_packages(db: &DatabaseConnection) {
    for (id, student, course, start) in PACKAGES {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        let end = start + Duration::weeks(8);
        let values: Vec<Value> = vec![
            id.into(),
            student.into(),
            course.into(),
            "recurring".into(),
            start.into(),
            end.into(),
        ];
        db.execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "INSERT INTO student_course_packages VALUES (?, ?, ?, ?, ?, ?)",
            values,
        ))
        .await
        .expect("insert package");
    }
}

/// Expected occurrences in canonical order (week_start, course_id, student_id, occurrence_id).
pub fn expected_occurrences() -> Vec<(String, NaiveDate, String, String)> {
    let mut out = Vec::new();
    for (id, student, course, start) in PACKAGES {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        for w in 0..8 {
            let week = start + Duration::weeks(w);
            out.push((
                format!("{id}_{}", week.format("%Y-%m-%d")),
                week,
                course.to_string(),
                student.to_string(),
            ));
        }
    }
    out.sort_by(|a, b| (a.1, &a.2, &a.3, &a.0).cmp(&(b.1, &b.2, &b.3, &b.0)));
    out
}

/// Weekly occurrences of recurring packages inside `[start_date, end_date)`,
/// emulating the recurring slot function with a recursive CTE.
pub const OCCURRENCES_SQL: &str = "WITH RECURSIVE weeks(student_course_id, student_id, course_id, week_start, package_end) AS (
    SELECT student_course_id, student_id, course_id, start_date, end_date
    FROM student_course_packages WHERE purchase_method = ?
    UNION ALL
    SELECT student_course_id, student_id, course_id, date(week_start, '+7 days'), package_end
    FROM weeks WHERE date(week_start, '+7 days') < package_end
)
SELECT student_course_id || '_' || week_start AS occurrence_id,
       student_course_id, student_id, course_id, week_start,
       date(week_start, '+7 days') AS week_end
FROM weeks";

pub fn occurrence_relation() -> Relation {
    Relation::function(
        "recurring_occurrences",
        FunctionSource::Derived {
            sql: OCCURRENCES_SQL.to_string(),
            args: vec!["recurring".into()],
        },
        SnapshotWindow::new("week_end", chrono_tz::Asia::Ho_Chi_Minh),
        FieldMap::new()
            .insert("week_start", "week_start", FieldKind::Date)
            .insert("course_id", "course_id", FieldKind::String)
            .insert("student_id", "student_id", FieldKind::String)
            .insert("occurrence_id", "occurrence_id", FieldKind::String),
        "occurrence_id",
    )
    .expect("valid relation")
    .with_filter("student_ids", FilterBinding::AnyOf("student_id".into()))
    .with_filter("course_ids", FilterBinding::AnyOf("course_id".into()))
}

pub fn occurrence_key() -> SortKey {
    SortKeyStrategy::new(
        vec![
            ("week_start", SortDir::Asc, FieldKind::Date),
            ("course_id", SortDir::Asc, FieldKind::String),
            ("student_id", SortDir::Asc, FieldKind::String),
        ],
        ("occurrence_id", FieldKind::String),
    )
    .unwrap()
    .resolve(TimeWindow::Upcoming)
}

/// Before every package starts, so all 40 occurrences are current.
pub fn snapshot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 20, 3, 0, 0).unwrap()
}
