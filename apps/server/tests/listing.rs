mod support;

use certadmin::db::search::{FilterSpec, PaginationSpec, ResultEnvelope, SortDirection, SortSpec};
use certadmin::error::{StoreError, ValidationCode};
use certadmin::models::{
    EventRow, EventStatus, ListingRow, LogRow, ParticipantRow, Resource, StatusFilter,
};
use certadmin::Error;
use std::time::Duration;
use support::*;

async fn list<R: ListingRow>(
    t: &TestEngine,
    pairs: &[(&str, &str)],
) -> certadmin::Result<ResultEnvelope<R>> {
    t.engine.list::<R>(&raw(pairs)).await
}

fn names(envelope: &ResultEnvelope<ParticipantRow>) -> Vec<&str> {
    envelope.data.iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn search_tokens_must_each_match_some_field() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<ParticipantRow>(&t, &[("search", "john smith")]).await?;

    // "Johnny Appleseed" matches only "john"; "Jane Smith" only "smith". Bob Stone matches both
    // tokens through his email address.
    assert_eq!(names(&result), ["Bob Stone", "John Smith"]);
    assert_eq!(result.pagination.total, 2);
    Ok(())
}

#[tokio::test]
async fn search_is_case_insensitive_and_sanitized() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<ParticipantRow>(&t, &[("search", "CERT_10%")]).await?;

    // Wildcards become separators: tokens "CERT" and "10".
    assert_eq!(result.pagination.total, 3);
    assert_eq!(result.meta.filters.search.as_deref(), Some("CERT 10"));
    Ok(())
}

#[tokio::test]
async fn log_search_covers_metadata_text() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<LogRow>(&t, &[("search", "csv")]).await?;

    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].action, "participants.import");
    Ok(())
}

#[tokio::test]
async fn unknown_sort_field_is_rejected_before_the_store() {
    let t = test_engine();

    let err = t
        .engine
        .query::<EventRow>(
            &FilterSpec::default(),
            &SortSpec::new("password", SortDirection::Asc),
            &PaginationSpec::new(1, 12),
        )
        .await
        .expect_err("unknown sort field");

    match &err {
        Error::Validation {
            errors,
            allowed_sort_fields,
            ..
        } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code, ValidationCode::InvalidSortField);
            assert_eq!(errors[0].field, "sort_by");
            assert_eq!(allowed_sort_fields, Resource::Events.sortable_fields());
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(err.to_body()["allowedSortFields"][4], "participant_count");
    assert_eq!(t.store.fetch_count(), 0);
}

#[tokio::test]
async fn all_validation_problems_are_reported_together() {
    let t = test_engine();

    let err = t
        .engine
        .query::<LogRow>(
            &FilterSpec {
                date_from: Some("not a date".into()),
                ..Default::default()
            },
            &SortSpec::new("name", SortDirection::Desc),
            &PaginationSpec::new(0, 5_000),
        )
        .await
        .expect_err("invalid request");

    let Error::Validation { errors, .. } = err else {
        panic!("expected validation error");
    };
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["page", "limit", "sort_by", "date_from"]);
    assert_eq!(errors[0].code, ValidationCode::InvalidPage);
    assert_eq!(errors[1].code, ValidationCode::InvalidLimit);
    assert_eq!(t.store.fetch_count(), 0);
}

#[tokio::test]
async fn parser_date_errors_join_engine_errors() {
    let t = test_engine();

    let err = list::<ParticipantRow>(&t, &[("date_to", "soon"), ("sort_by", "password")])
        .await
        .expect_err("invalid request");

    let Error::Validation { errors, .. } = err else {
        panic!("expected validation error");
    };
    let codes: Vec<_> = errors.iter().map(|e| (e.code, e.field.as_str())).collect();
    assert_eq!(
        codes,
        [
            (ValidationCode::InvalidDate, "date_to"),
            (ValidationCode::InvalidSortField, "sort_by"),
        ]
    );
}

#[tokio::test]
async fn engine_accepts_limits_up_to_one_thousand() -> anyhow::Result<()> {
    let t = test_engine();

    let result = t
        .engine
        .query::<ParticipantRow>(
            &FilterSpec::default(),
            &SortSpec::default_for(Resource::Participants),
            &PaginationSpec::new(1, 1_000),
        )
        .await?;

    assert_eq!(result.pagination.limit, 1_000);
    assert_eq!(result.data.len(), 4);
    Ok(())
}

#[tokio::test]
async fn events_get_derived_status_and_counts() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<EventRow>(&t, &[("sort_by", "date"), ("sort_order", "asc")]).await?;

    let statuses: Vec<_> = result
        .data
        .iter()
        .map(|e| (e.event_name.as_str(), e.status))
        .collect();
    assert_eq!(
        statuses,
        [
            ("Rust Meetup", Some(EventStatus::Ended)),
            ("Cloud Summit", Some(EventStatus::Ongoing)),
            ("Rust Workshop", Some(EventStatus::Upcoming)),
        ]
    );

    let workshop = &result.data[2];
    assert_eq!(workshop.id, t.seeded.rust_workshop);
    assert_eq!((workshop.participant_count, workshop.certificate_count), (2, 1));
    let meetup = &result.data[0];
    assert_eq!((meetup.participant_count, meetup.certificate_count), (0, 0));
    Ok(())
}

#[tokio::test]
async fn event_status_filter_compares_with_today() -> anyhow::Result<()> {
    let t = test_engine();

    for (status, expected) in [
        ("upcoming", "Rust Workshop"),
        ("ongoing", "Cloud Summit"),
        ("ended", "Rust Meetup"),
    ] {
        let result = list::<EventRow>(&t, &[("event_status", status)]).await?;
        assert_eq!(result.data.len(), 1, "{status}");
        assert_eq!(result.data[0].event_name, expected);
    }
    Ok(())
}

#[tokio::test]
async fn sort_by_aggregate_count() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<EventRow>(
        &t,
        &[("sort_by", "certificate_count"), ("sort_order", "desc")],
    )
    .await?;

    let counts: Vec<_> = result.data.iter().map(|e| e.certificate_count).collect();
    assert_eq!(counts, [2, 1, 0]);
    Ok(())
}

#[tokio::test]
async fn participant_status_and_event_filters() -> anyhow::Result<()> {
    let t = test_engine();

    let revoked = list::<ParticipantRow>(&t, &[("status", "revoked")]).await?;
    assert_eq!(names(&revoked), ["Jane Smith"]);
    assert!(revoked.data[0].revoked_at.is_some());

    let active = list::<ParticipantRow>(&t, &[("status", "active")]).await?;
    assert_eq!(active.pagination.total, 3);

    let all = list::<ParticipantRow>(&t, &[("status", "all")]).await?;
    assert_eq!(all.pagination.total, 4);
    assert_eq!(all.meta.filters.status, Some(StatusFilter::All));

    let summit = t.seeded.cloud_summit.to_string();
    let by_event = list::<ParticipantRow>(&t, &[("event_id", summit.as_str())]).await?;
    assert_eq!(names(&by_event), ["Bob Stone", "Jane Smith"]);
    assert!(by_event
        .data
        .iter()
        .all(|p| p.event_name.as_deref() == Some("Cloud Summit")));

    let tagged = list::<ParticipantRow>(&t, &[("tag", "workshop")]).await?;
    assert_eq!(names(&tagged), ["Johnny Appleseed", "John Smith"]);
    Ok(())
}

#[tokio::test]
async fn date_range_is_inclusive() -> anyhow::Result<()> {
    let t = test_engine();

    let participants = list::<ParticipantRow>(
        &t,
        &[("date_from", "2024-06-02"), ("date_to", "2024-06-03")],
    )
    .await?;
    // Jane was created exactly at midnight on the upper bound.
    assert_eq!(names(&participants), ["Jane Smith", "Johnny Appleseed"]);

    let events = list::<EventRow>(&t, &[("date_to", "2024-06-15")]).await?;
    let names: Vec<_> = events.data.iter().map(|e| e.event_name.as_str()).collect();
    assert_eq!(names, ["Rust Meetup", "Cloud Summit"]);
    Ok(())
}

#[tokio::test]
async fn filters_without_a_column_are_ignored() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<LogRow>(&t, &[("tag", "workshop"), ("status", "revoked")]).await?;

    assert_eq!(result.pagination.total, 3);
    Ok(())
}

#[tokio::test]
async fn envelope_reports_page_math_and_meta() -> anyhow::Result<()> {
    let t = test_engine();

    let result = list::<ParticipantRow>(&t, &[("limit", "3"), ("page", "2")]).await?;

    assert_eq!(result.data.len(), 1);
    let p = result.pagination;
    assert_eq!((p.page, p.limit, p.total, p.total_pages), (2, 3, 4, 2));
    assert!(!p.has_next);
    assert!(p.has_prev);

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["pagination"]["totalPages"], 2);
    assert_eq!(json["pagination"]["hasPrev"], true);
    assert_eq!(
        json["meta"]["sort"],
        serde_json::json!({"field": "created_at", "direction": "desc"})
    );
    assert_eq!(json["meta"]["filters"], serde_json::json!({}));
    assert!(json["meta"]["queryTime"].is_u64());
    Ok(())
}

#[tokio::test]
async fn repeated_queries_are_served_from_cache_until_ttl() -> anyhow::Result<()> {
    let t = test_engine();
    let params = [("search", "smith"), ("sort_by", "name")];

    let first = list::<ParticipantRow>(&t, &params).await?;
    let second = list::<ParticipantRow>(&t, &params).await?;
    assert_eq!(first.data, second.data);
    assert_eq!(t.store.fetch_count(), 1);

    // A different page is a different query.
    list::<ParticipantRow>(&t, &[("search", "smith"), ("sort_by", "name"), ("page", "2")]).await?;
    assert_eq!(t.store.fetch_count(), 2);

    t.clock.advance(Duration::from_secs(31));
    list::<ParticipantRow>(&t, &params).await?;
    assert_eq!(t.store.fetch_count(), 3);
    Ok(())
}

#[tokio::test]
async fn store_failures_surface_as_database_errors_and_are_not_cached() -> anyhow::Result<()> {
    let t = test_engine();
    t.store
        .fail_next([StoreError::client("42P01", "relation \"participants\" does not exist")]);

    let err = list::<ParticipantRow>(&t, &[])
        .await
        .expect_err("store failure");
    assert!(matches!(err, Error::Database(StoreError::Client { .. })));
    let body = err.to_body();
    assert_eq!(body["message"], "Query execution failed");
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.contains("does not exist")));

    let retried = list::<ParticipantRow>(&t, &[]).await?;
    assert_eq!(retried.pagination.total, 4);
    assert_eq!(t.store.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn page_window_always_follows_page_and_limit() -> anyhow::Result<()> {
    let t = test_engine();
    assert_eq!(t.store.len(Resource::Participants), 4);
    let sort = SortSpec::default_for(Resource::Participants);

    // A pagination value carrying its own offset cannot shift the window.
    let shifted: PaginationSpec =
        serde_json::from_value(serde_json::json!({"page": 1, "limit": 2, "offset": 2}))?;
    assert_eq!(shifted.offset(), 0);

    let first = t
        .engine
        .query::<ParticipantRow>(&FilterSpec::default(), &sort, &shifted)
        .await?;
    assert_eq!(names(&first), ["Bob Stone", "Jane Smith"]);
    assert!(!first.pagination.has_prev);

    let again = t
        .engine
        .query::<ParticipantRow>(&FilterSpec::default(), &sort, &PaginationSpec::new(1, 2))
        .await?;
    assert_eq!(names(&again), ["Bob Stone", "Jane Smith"]);
    assert_eq!(t.store.fetch_count(), 1);

    let second = t
        .engine
        .query::<ParticipantRow>(&FilterSpec::default(), &sort, &PaginationSpec::new(2, 2))
        .await?;
    assert_eq!(names(&second), ["Johnny Appleseed", "John Smith"]);
    assert!(second.pagination.has_prev);
    assert_eq!(t.store.fetch_count(), 2);
    Ok(())
}
