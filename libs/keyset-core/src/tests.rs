#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::{
        base64_url, CursorCodec, CursorError, FieldKind, FilterSet, KeyValue, PageError, Resume,
        SortDir, SortField, SortKey, SortKeyError, SortKeyStrategy, TimeWindow,
    };

    fn lesson_key() -> SortKey {
        SortKey::new(
            vec![
                SortField::new("start_time", SortDir::Asc, FieldKind::DateTimeUtc),
                SortField::new("lesson_id", SortDir::Asc, FieldKind::String),
            ],
            "lesson_id",
        )
        .expect("valid sort key")
    }

    fn boundary() -> Vec<KeyValue> {
        vec![
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap().into(),
            "lesson-07".into(),
        ]
    }

    fn raw(json: serde_json::Value) -> String {
        base64_url::encode(serde_json::to_vec(&json).unwrap().as_slice())
    }

    #[test]
    fn test_sort_key_requires_terminal_tiebreaker() {
        let err = SortKey::new(
            vec![
                SortField::new("lesson_id", SortDir::Asc, FieldKind::String),
                SortField::new("start_time", SortDir::Asc, FieldKind::DateTimeUtc),
            ],
            "lesson_id",
        )
        .unwrap_err();
        assert_eq!(err, SortKeyError::MissingTiebreaker("lesson_id".into()));

        assert_eq!(SortKey::new(vec![], "id").unwrap_err(), SortKeyError::Empty);
    }

    #[test]
    fn test_sort_key_rejects_duplicate_fields() {
        let err = SortKey::new(
            vec![
                SortField::new("id", SortDir::Asc, FieldKind::String),
                SortField::new("ID", SortDir::Desc, FieldKind::String),
            ],
            "id",
        )
        .unwrap_err();
        assert!(matches!(err, SortKeyError::DuplicateField(_)));
    }

    #[test]
    fn test_sort_key_signature() {
        let key = lesson_key();
        assert_eq!(key.signature(), "+start_time,+lesson_id");
        assert_eq!(key.reversed().signature(), "-start_time,-lesson_id");
        assert!(key.matches_signature(" +start_time , +lesson_id "));
        assert!(key.matches_signature("start_time,lesson_id")); // implicit asc
        assert!(!key.matches_signature("-start_time,+lesson_id"));
        assert!(!key.matches_signature("+start_time"));
    }

    #[test]
    fn test_strategy_past_window_flips_every_direction() {
        let strategy = SortKeyStrategy::new(
            vec![("start_time", SortDir::Asc, FieldKind::DateTimeUtc)],
            ("lesson_id", FieldKind::String),
        )
        .unwrap();

        let upcoming = strategy.resolve(TimeWindow::Upcoming);
        let past = strategy.resolve(TimeWindow::Past);
        assert_eq!(upcoming.signature(), "+start_time,+lesson_id");
        assert_eq!(past.signature(), "-start_time,-lesson_id");
        assert_eq!(past.tiebreaker().field, "lesson_id");
    }

    #[test]
    fn test_value_seek_round_trip() {
        let key = lesson_key();
        let filters = FilterSet::new().with_any_of("location_ids", ["loc-1"]);
        let codec = CursorCodec::value_seek(&key, &filters);

        let token = codec.encode_values(&boundary()).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), Resume::Seek(boundary()));
    }

    #[test]
    fn test_value_seek_keeps_sub_second_precision() {
        let key = lesson_key();
        let codec = CursorCodec::value_seek(&key, &FilterSet::new());
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let values = vec![at.into(), "x".into()];

        let token = codec.encode_values(&values).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), Resume::Seek(values));
    }

    #[test]
    fn test_encode_rejects_wrong_arity_and_kind() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        assert_eq!(
            codec.encode_values(&["only".into()]).unwrap_err(),
            CursorError::ArityMismatch {
                expected: 2,
                got: 1
            }
        );
        assert!(matches!(
            codec.encode_values(&["not-a-time".into(), "x".into()]),
            Err(CursorError::KindMismatch {
                expected: "datetime",
                ..
            })
        ));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        assert_eq!(codec.decode("invalid_base64!"), Err(CursorError::InvalidBase64));
    }

    #[test]
    fn test_decode_invalid_json() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        let token = base64_url::encode(b"not_json");
        assert_eq!(codec.decode(&token), Err(CursorError::InvalidJson));
    }

    #[test]
    fn test_decode_invalid_version() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        let token = raw(serde_json::json!({
            "v": 2, "k": ["a", "b"], "s": "+start_time,+lesson_id", "f": ""
        }));
        assert_eq!(codec.decode(&token), Err(CursorError::InvalidVersion));
    }

    #[test]
    fn test_decode_empty_keys_and_fields() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        let empty_keys = raw(serde_json::json!({
            "v": 1, "k": [], "s": "+start_time,+lesson_id", "f": ""
        }));
        assert_eq!(codec.decode(&empty_keys), Err(CursorError::InvalidKeys));

        let empty_fields = raw(serde_json::json!({ "v": 1, "k": ["a"], "s": "", "f": "" }));
        assert_eq!(codec.decode(&empty_fields), Err(CursorError::InvalidFields));
    }

    #[test]
    fn test_decode_rejects_other_sort_key() {
        let key = lesson_key();
        let filters = FilterSet::new();
        let token = CursorCodec::value_seek(&key, &filters)
            .encode_values(&boundary())
            .unwrap();

        let past = CursorCodec::value_seek(&key.reversed(), &filters);
        assert!(matches!(
            past.decode(&token),
            Err(CursorError::SortKeyMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_filters() {
        let key = lesson_key();
        let token = CursorCodec::value_seek(&key, &FilterSet::new().with_any_of("teacher_ids", ["t1"]))
            .encode_values(&boundary())
            .unwrap();

        let other = CursorCodec::value_seek(&key, &FilterSet::new().with_any_of("teacher_ids", ["t2"]));
        assert_eq!(other.decode(&token), Err(CursorError::FilterMismatch));
    }

    #[test]
    fn test_unrestricted_dimensions_do_not_change_fingerprint() {
        let plain = FilterSet::new();
        let with_empty = FilterSet::new()
            .with_any_of("course_ids", Vec::<String>::new())
            .with_keyword("keyword", "   ");
        assert_eq!(plain.fingerprint(), with_empty.fingerprint());
        assert_eq!(plain.fingerprint().len(), 16);
    }

    #[test]
    fn test_decode_rejects_bad_key_kind() {
        let codec = CursorCodec::value_seek(&lesson_key(), &FilterSet::new());
        let token = raw(serde_json::json!({
            "v": 1,
            "k": ["yesterday", "lesson-1"],
            "s": "+start_time,+lesson_id",
            "f": FilterSet::new().fingerprint(),
        }));
        assert!(matches!(
            codec.decode(&token),
            Err(CursorError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_ordinal_round_trip_and_snapshot_guard() {
        let key = lesson_key();
        let filters = FilterSet::new();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let codec = CursorCodec::ordinal(&key, &filters, monday);
        let token = codec.encode_ordinal(16).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), Resume::Ordinal(16));

        let next_day = CursorCodec::ordinal(&key, &filters, tuesday);
        assert!(matches!(
            next_day.decode(&token),
            Err(CursorError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_row_number_outside_signed_range() {
        let key = lesson_key();
        let filters = FilterSet::new();
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let codec = CursorCodec::ordinal(&key, &filters, day);

        for n in [0, i64::MAX as u64 + 1, u64::MAX] {
            let token = raw(serde_json::json!({
                "v": 1,
                "n": n,
                "s": key.signature(),
                "f": filters.fingerprint(),
                "d": "2024-03-04",
            }));
            assert_eq!(codec.decode(&token), Err(CursorError::InvalidOrdinal), "n = {n}");
        }
        assert_eq!(codec.encode_ordinal(u64::MAX), Err(CursorError::InvalidOrdinal));

        let largest = codec.encode_ordinal(i64::MAX as u64).unwrap();
        assert_eq!(codec.decode(&largest).unwrap(), Resume::Ordinal(i64::MAX as u64));
    }

    #[test]
    fn test_floating_dimension_moves_without_breaking_cursors() {
        let key = lesson_key();
        let at = |h: u32| Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap();
        let upcoming = |now: chrono::DateTime<Utc>| {
            FilterSet::new()
                .with_time_range("lesson_end", Some(now), None)
                .with_any_of("teacher_ids", ["t1"])
                .floating("lesson_end")
        };

        let token = CursorCodec::value_seek(&key, &upcoming(at(9)))
            .encode_values(&boundary())
            .unwrap();
        let later = CursorCodec::value_seek(&key, &upcoming(at(10)));
        assert_eq!(later.decode(&token).unwrap(), Resume::Seek(boundary()));

        // still a filter, and still bound by which side is open
        assert!(upcoming(at(10)).is_floating("LESSON_END"));
        assert_eq!(upcoming(at(10)).active().count(), 2);
        let past = FilterSet::new()
            .with_time_range("lesson_end", None, Some(at(9)))
            .with_any_of("teacher_ids", ["t1"])
            .floating("lesson_end");
        assert_ne!(past.fingerprint(), upcoming(at(9)).fingerprint());

        // other dimensions stay pinned
        let other_teacher = FilterSet::new()
            .with_time_range("lesson_end", Some(at(9)), None)
            .with_any_of("teacher_ids", ["t2"])
            .floating("lesson_end");
        assert_ne!(other_teacher.fingerprint(), upcoming(at(9)).fingerprint());

        // without the mark the bound is part of the identity
        let pinned = |now: chrono::DateTime<Utc>| FilterSet::new().with_time_range("lesson_end", Some(now), None);
        assert_ne!(pinned(at(9)).fingerprint(), pinned(at(10)).fingerprint());
    }

    #[test]
    fn test_variants_are_not_interchangeable() {
        let key = lesson_key();
        let filters = FilterSet::new();
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let seek = CursorCodec::value_seek(&key, &filters);
        let ordinal = CursorCodec::ordinal(&key, &filters, day);

        let seek_token = seek.encode_values(&boundary()).unwrap();
        let ordinal_token = ordinal.encode_ordinal(3).unwrap();

        assert_eq!(seek.decode(&ordinal_token), Err(CursorError::WrongVariant("ordinal")));
        assert_eq!(
            ordinal.decode(&seek_token),
            Err(CursorError::WrongVariant("value-seek"))
        );
        assert_eq!(ordinal.encode_ordinal(0), Err(CursorError::InvalidOrdinal));
    }

    #[test]
    fn test_cursor_error_wraps_into_page_error() {
        let err: PageError = CursorError::InvalidBase64.into();
        assert!(matches!(err, PageError::InvalidCursor(CursorError::InvalidBase64)));
        assert_eq!(err.to_string(), "invalid cursor: cursor is not valid base64url");
    }

    #[test]
    fn test_filter_validation() {
        use crate::DimensionKind;
        let accepts = |name: &str| match name {
            "teacher_ids" => Some(DimensionKind::AnyOf),
            "lesson_time" => Some(DimensionKind::TimeRange),
            _ => None,
        };

        assert!(FilterSet::new()
            .with_any_of("teacher_ids", ["t1"])
            .validate(accepts)
            .is_ok());

        let unknown = FilterSet::new().with_any_of("room_ids", ["r1"]).validate(accepts);
        assert!(matches!(unknown, Err(PageError::InvalidFilter(_))));

        let wrong_kind = FilterSet::new().with_keyword("teacher_ids", "x").validate(accepts);
        assert!(matches!(wrong_kind, Err(PageError::InvalidFilter(_))));

        let inverted = FilterSet::new()
            .with_time_range(
                "lesson_time",
                Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()),
            )
            .validate(accepts);
        assert!(matches!(inverted, Err(PageError::InvalidFilter(_))));
    }
}
