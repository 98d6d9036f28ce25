#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lesson_listing::config::ListingConfig;
use lesson_listing::contract::client::LessonListingApi;
use lesson_listing::gateways::local::LessonListingLocalClient;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement, Value};

/// Fresh in-memory SQLite database with migrations applied.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");
    lesson_listing::migrate(&db)
        .await
        .expect("Failed to run migrations");
    db
}

pub fn create_test_client(db: DatabaseConnection, cfg: &ListingConfig) -> Arc<dyn LessonListingApi> {
    let service = lesson_listing::build_service(db, cfg).expect("service wiring");
    Arc::new(LessonListingLocalClient::new(Arc::new(service)))
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn insert(db: &DatabaseConnection, sql: &str, values: Vec<Value>) {
    db.execute(Statement::from_sql_and_values(DbBackend::Sqlite, sql, values))
        .await
        .expect("insert fixture row");
}

pub struct LessonSeed {
    pub lesson_id: String,
    pub name: String,
    pub location_id: &'static str,
    pub teacher_id: String,
    pub course_id: &'static str,
    pub class_id: Option<&'static str>,
    pub status: &'static str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub async fn insert_lesson(db: &DatabaseConnection, l: &LessonSeed) {
    insert(
        db,
        "INSERT INTO lessons (lesson_id, name, location_id, teacher_id, course_id, class_id, scheduling_status, start_time, end_time)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            l.lesson_id.clone().into(),
            l.name.clone().into(),
            l.location_id.into(),
            l.teacher_id.clone().into(),
            l.course_id.into(),
            l.class_id.map(str::to_string).into(),
            l.status.into(),
            l.start_time.into(),
            l.end_time.into(),
        ],
    )
    .await;
}

pub fn lesson_base() -> DateTime<Utc> {
    utc(2024, 3, 4, 1, 0)
}

/// 22 lessons, three per start hour; ids are not in start order.
/// Returns ids in `start_time, lesson_id` order.
pub async fn seed_lessons(db: &DatabaseConnection) -> Vec<String> {
    let mut keyed = Vec::new();
    for i in 0..22i64 {
        let start = lesson_base() + Duration::hours(i / 3);
        let seed = LessonSeed {
            lesson_id: format!("lesson-{:02}", (i * 7) % 22),
            name: if i % 2 == 0 {
                format!("Algebra {i}")
            } else {
                format!("Biology {i}")
            },
            location_id: if i < 11 { "loc-1" } else { "loc-2" },
            teacher_id: format!("t{}", i % 3),
            course_id: "course-1",
            class_id: if i % 4 == 0 { Some("class-a") } else { None },
            status: if i % 5 == 0 { "draft" } else { "published" },
            start_time: start,
            end_time: start + Duration::minutes(45),
        };
        insert_lesson(db, &seed).await;
        keyed.push((seed.start_time, seed.lesson_id));
    }
    keyed.sort();
    keyed.into_iter().map(|(_, id)| id).collect()
}

pub async fn insert_package(
    db: &DatabaseConnection,
    (id, student, course, method, start, end): (&str, &str, &str, &str, &str, &str),
) {
    insert(
        db,
        "INSERT INTO student_course_packages (student_course_id, student_id, student_name, course_id, location_id, purchase_method, start_date, end_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            id.into(),
            student.into(),
            format!("Student {student}").into(),
            course.into(),
            "loc-1".into(),
            method.into(),
            date(start).into(),
            date(end).into(),
        ],
    )
    .await;
}

/// (student_course_id, student_id, course_id, start_date); 8 weeks each.
pub const RECURRING: [(&str, &str, &str, &str); 5] = [
    ("scp-1", "s1", "c1", "2024-01-01"),
    ("scp-2", "s2", "c1", "2024-01-01"),
    ("scp-3", "s1", "c2", "2024-01-02"),
    ("scp-4", "s3", "c2", "2024-01-01"),
    ("scp-5", "s2", "c2", "2024-01-03"),
];

pub async fn seed_recurring(db: &DatabaseConnection) {
    for (id, student, course, start) in RECURRING {
        let end = (date(start) + Duration::weeks(8)).format("%Y-%m-%d").to_string();
        insert_package(db, (id, student, course, "recurring", start, &end)).await;
    }
    // slot packages never expand into weekly occurrences
    insert_package(db, ("slot-x", "s9", "c1", "slot", "2024-01-01", "2024-06-01")).await;
}

/// Occurrence ids in `week_start, course_id, student_id, occurrence_id` order.
pub fn expected_occurrences() -> Vec<String> {
    let mut rows = Vec::new();
    for (id, student, course, start) in RECURRING {
        for w in 0..8 {
            let week = date(start) + Duration::weeks(w);
            rows.push((
                week,
                course,
                student,
                format!("{id}_{}", week.format("%Y-%m-%d")),
            ));
        }
    }
    rows.sort();
    rows.into_iter().map(|r| r.3).collect()
}

pub async fn insert_subscription(
    db: &DatabaseConnection,
    id: &str,
    grade: &str,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) {
    insert(
        db,
        "INSERT INTO student_subscriptions (student_subscription_id, student_id, student_name, course_id, location_id, grade, class_id, start_at, end_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            id.into(),
            format!("stu-{id}").into(),
            format!("Student {id}").into(),
            "c1".into(),
            "loc-1".into(),
            grade.into(),
            Option::<String>::None.into(),
            start_at.into(),
            end_at.into(),
        ],
    )
    .await;
}
