//! Ordinal paging over a numbered, function-backed relation.

mod common;

use anyhow::Result;
use chrono::Duration;
use keyset_core::{
    base64_url, CursorError, FilterSet, LimitCfg, Page, PageError, PageRequest,
};
use keyset_db::PageExecutor;

use common::*;

fn limits() -> LimitCfg {
    LimitCfg {
        default: 15,
        max: 100,
        ..LimitCfg::default()
    }
}

fn keys(page: &Page<OccurrenceRow>) -> Vec<String> {
    page.items.iter().map(|r| r.occurrence_id.clone()).collect()
}

#[tokio::test]
async fn forty_occurrences_page_by_row_number() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let rel = occurrence_relation();
    let key = occurrence_key();
    let filters = FilterSet::new();
    let expected: Vec<String> = expected_occurrences().into_iter().map(|o| o.0).collect();
    assert_eq!(expected.len(), 40);

    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    let mut req = PageRequest::first(15).at(snapshot());
    loop {
        let page: Page<OccurrenceRow> = exec.fetch_page(&rel, &key, &filters, &req, &limits()).await?;
        assert_eq!(page.page_info.total_count, 40);
        sizes.push(page.items.len());
        seen.extend(keys(&page));
        match page.page_info.next_cursor {
            Some(next) => req = PageRequest::first(15).with_cursor(next).at(snapshot()),
            None => break,
        }
    }

    assert_eq!(sizes, vec![15, 15, 10]);
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn page_two_starts_at_row_number_sixteen() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let rel = occurrence_relation();
    let key = occurrence_key();
    let filters = FilterSet::new();
    let expected = expected_occurrences();

    let p1: Page<OccurrenceRow> = exec
        .fetch_page(&rel, &key, &filters, &PageRequest::first(15).at(snapshot()), &limits())
        .await?;
    let p2: Page<OccurrenceRow> = exec
        .fetch_page(
            &rel,
            &key,
            &filters,
            &PageRequest::first(15)
                .with_cursor(p1.page_info.next_cursor.clone().unwrap())
                .at(snapshot()),
            &limits(),
        )
        .await?;

    let sixteenth = &p2.items[0];
    assert_eq!(sixteenth.occurrence_id, expected[15].0);
    assert_eq!(
        sixteenth.occurrence_id,
        format!(
            "{}_{}",
            sixteenth.student_course_id,
            sixteenth.week_start.format("%Y-%m-%d")
        )
    );
    assert_eq!(sixteenth.week_end, sixteenth.week_start + Duration::weeks(1));

    let looked_up: Option<OccurrenceRow> = exec
        .lookup_ordinal(&rel, &key, &filters, snapshot(), 16)
        .await?;
    assert_eq!(looked_up.as_ref(), Some(sixteenth));

    let beyond: Option<OccurrenceRow> = exec
        .lookup_ordinal(&rel, &key, &filters, snapshot(), 41)
        .await?;
    assert!(beyond.is_none());
    Ok(())
}

#[tokio::test]
async fn backward_from_page_two_returns_page_one() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let rel = occurrence_relation();
    let key = occurrence_key();
    let filters = FilterSet::new();

    let p1: Page<OccurrenceRow> = exec
        .fetch_page(&rel, &key, &filters, &PageRequest::first(15).at(snapshot()), &limits())
        .await?;
    let p2: Page<OccurrenceRow> = exec
        .fetch_page(
            &rel,
            &key,
            &filters,
            &PageRequest::first(15)
                .with_cursor(p1.page_info.next_cursor.clone().unwrap())
                .at(snapshot()),
            &limits(),
        )
        .await?;
    let back: Page<OccurrenceRow> = exec
        .fetch_page(
            &rel,
            &key,
            &filters,
            &PageRequest::first(15)
                .with_cursor(p2.page_info.prev_cursor.clone().unwrap())
                .backward()
                .at(snapshot()),
            &limits(),
        )
        .await?;

    assert_eq!(keys(&back), keys(&p1));
    assert!(back.page_info.prev_cursor.is_none());
    assert_eq!(back.page_info.next_cursor, p1.page_info.next_cursor);
    Ok(())
}

#[tokio::test]
async fn snapshot_is_required_and_pinned() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let rel = occurrence_relation();
    let key = occurrence_key();
    let filters = FilterSet::new();

    let missing = exec
        .fetch_page::<OccurrenceRow>(&rel, &key, &filters, &PageRequest::first(15), &limits())
        .await;
    assert!(matches!(missing, Err(PageError::InvalidFilter(_))));

    let p1: Page<OccurrenceRow> = exec
        .fetch_page(&rel, &key, &filters, &PageRequest::first(15).at(snapshot()), &limits())
        .await?;
    let next_day = snapshot() + Duration::days(1);
    let replayed = exec
        .fetch_page::<OccurrenceRow>(
            &rel,
            &key,
            &filters,
            &PageRequest::first(15)
                .with_cursor(p1.page_info.next_cursor.unwrap())
                .at(next_day),
            &limits(),
        )
        .await;
    assert!(matches!(
        replayed,
        Err(PageError::InvalidCursor(CursorError::SnapshotMismatch { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn snapshot_hides_ended_occurrences() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);

    // 2024-01-15 in Asia/Ho_Chi_Minh; weeks ending on or before it are gone
    let later = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 1, 15, 1, 0, 0).unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let want: Vec<String> = expected_occurrences()
        .into_iter()
        .filter(|o| o.1 + Duration::weeks(1) > date)
        .map(|o| o.0)
        .collect();

    let page: Page<OccurrenceRow> = exec
        .fetch_page(
            &occurrence_relation(),
            &occurrence_key(),
            &FilterSet::new(),
            &PageRequest::first(100).at(later),
            &limits(),
        )
        .await?;
    assert_eq!(page.page_info.total_count, want.len() as u64);
    assert_eq!(keys(&page), want);
    Ok(())
}

#[tokio::test]
async fn filters_apply_inside_the_numbering() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let filters = FilterSet::new().with_any_of("student_ids", ["s2"]);
    let want: Vec<String> = expected_occurrences()
        .into_iter()
        .filter(|o| o.3 == "s2")
        .map(|o| o.0)
        .collect();

    let first: Option<OccurrenceRow> = exec
        .lookup_ordinal(&occurrence_relation(), &occurrence_key(), &filters, snapshot(), 1)
        .await?;
    assert_eq!(first.map(|o| o.occurrence_id), want.first().cloned());

    let page: Page<OccurrenceRow> = exec
        .fetch_page(
            &occurrence_relation(),
            &occurrence_key(),
            &filters,
            &PageRequest::first(100).at(snapshot()),
            &limits(),
        )
        .await?;
    assert_eq!(keys(&page), want);
    assert_eq!(page.page_info.total_count, 16);
    Ok(())
}

#[tokio::test]
async fn value_seek_cursor_is_rejected_by_numbered_relation() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    seed_lessons(&db).await;
    let exec = PageExecutor::new(&db);

    let lessons: Page<LessonRow> = exec
        .fetch_page(
            &lesson_relation(),
            &upcoming_lessons(),
            &FilterSet::new(),
            &PageRequest::first(5),
            &limits(),
        )
        .await?;

    let res = exec
        .fetch_page::<OccurrenceRow>(
            &occurrence_relation(),
            &occurrence_key(),
            &FilterSet::new(),
            &PageRequest::first(15)
                .with_cursor(lessons.page_info.next_cursor.unwrap())
                .at(snapshot()),
            &limits(),
        )
        .await;
    assert!(matches!(res, Err(PageError::InvalidCursor(_))));
    Ok(())
}

/// Rewrites the row number of a genuine ordinal token.
fn with_row_number(token: &str, n: u64) -> String {
    let bytes = base64_url::decode(token).expect("issued token is base64url");
    let mut wire: serde_json::Value = serde_json::from_slice(&bytes).expect("issued token is json");
    wire["n"] = serde_json::json!(n);
    base64_url::encode(&serde_json::to_vec(&wire).expect("json"))
}

#[tokio::test]
async fn row_number_beyond_signed_range_is_rejected() -> Result<()> {
    let db = memory_db().await;
    seed_packages(&db).await;
    let exec = PageExecutor::new(&db);
    let rel = occurrence_relation();
    let key = occurrence_key();
    let filters = FilterSet::new();

    let p1: Page<OccurrenceRow> = exec
        .fetch_page(&rel, &key, &filters, &PageRequest::first(15).at(snapshot()), &limits())
        .await?;
    let next = p1.page_info.next_cursor.unwrap();

    for n in [u64::MAX, i64::MAX as u64 + 1] {
        let forged = with_row_number(&next, n);
        let res = exec
            .fetch_page::<OccurrenceRow>(
                &rel,
                &key,
                &filters,
                &PageRequest::first(15).with_cursor(forged).at(snapshot()),
                &limits(),
            )
            .await;
        assert_eq!(
            res.unwrap_err(),
            PageError::InvalidCursor(CursorError::InvalidOrdinal),
            "row number {n}"
        );
    }

    let last: Option<OccurrenceRow> = exec
        .lookup_ordinal(&rel, &key, &filters, snapshot(), u64::MAX)
        .await?;
    assert!(last.is_none());
    Ok(())
}
