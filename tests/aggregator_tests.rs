// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metric aggregation across mocked provider APIs.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use fitness_hub::db::{CredentialStore, MemoryStore};
use fitness_hub::error::{AppError, ErrorCategory};
use fitness_hub::models::{Metric, MetricQuery, Period, PlatformResult};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{config_with_timeout, link, test_hub, test_hub_with_config, valid_credential};

const USER: u64 = 1;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

async fn mount_fitbit_day(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/user/-/activities/date/2024-01-15.json"))
        .and(header("authorization", "Bearer fb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_strava_day(server: &MockServer, activities: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(query_param("after", "1705276800"))
        .and(query_param("before", "1705363200"))
        .and(header("authorization", "Bearer st-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(activities))
        .mount(server)
        .await;
}

async fn store_with(providers: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (provider, token) in providers {
        link(&store, USER, provider, &valid_credential(token)).await;
    }
    store
}

fn results(values: &[(&str, f64)]) -> Vec<PlatformResult> {
    values
        .iter()
        .map(|(name, value)| PlatformResult::new(*name, *value))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// END TO END
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_calories_fitbit_and_strava() {
    let server = MockServer::start().await;
    mount_fitbit_day(
        &server,
        json!({"summary": {"steps": 9000, "caloriesOut": 500, "distances": []}}),
    )
    .await;
    mount_strava_day(&server, json!([{"distance": 5000.0, "kilojoules": 1255.2}])).await;

    let store = store_with(&[("fitbit", "fb-token"), ("strava", "st-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let all = hub
        .get_metric(MetricQuery::new(Metric::Calories, USER, day()))
        .await
        .unwrap();
    assert_eq!(all, results(&[("fitbit", 500.0), ("strava", 300.0)]));

    let largest = hub
        .get_metric(MetricQuery::new(Metric::Calories, USER, day()).largest_only(true))
        .await
        .unwrap();
    assert_eq!(largest, results(&[("fitbit", 500.0)]));
}

#[tokio::test]
async fn test_largest_only_tie_goes_to_last() {
    let server = MockServer::start().await;
    mount_fitbit_day(
        &server,
        json!({"summary": {"steps": 0, "caloriesOut": 300, "distances": []}}),
    )
    .await;
    mount_strava_day(&server, json!([{"distance": 0.0, "kilojoules": 1255.2}])).await;

    let store = store_with(&[("fitbit", "fb-token"), ("strava", "st-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let largest = hub
        .get_metric(MetricQuery::new(Metric::Calories, USER, day()).largest_only(true))
        .await
        .unwrap();
    assert_eq!(largest, results(&[("strava", 300.0)]));
}

// ═══════════════════════════════════════════════════════════════════════════
// UNITS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_distance_is_kilometres() {
    let server = MockServer::start().await;
    mount_strava_day(
        &server,
        json!([{"distance": 10000.0}, {"distance": 2000.0, "kilojoules": 10.0}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .and(body_partial_json(json!({
            "aggregateBy": [{
                "dataSourceId": "derived:com.google.distance.delta:com.google.android.gms:merge_distance_delta"
            }],
            "bucketByTime": {"durationMillis": 86_400_000},
            "startTimeMillis": 1_705_276_800_000i64,
            "endTimeMillis": 1_705_363_200_000i64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": [{"dataset": [{"point": [
                {"value": [{"fpVal": 4500.0}]},
                {"value": [{"fpVal": 3000.0}]}
            ]}]}]
        })))
        .mount(&server)
        .await;

    let store = store_with(&[("google", "g-token"), ("strava", "st-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let distance = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap();
    assert_eq!(distance, results(&[("google", 7.5), ("strava", 12.0)]));
}

#[tokio::test]
async fn test_google_steps_and_empty_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .and(body_partial_json(json!({
            "aggregateBy": [{
                "dataSourceId": "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": [{"dataset": [{"point": [{"value": [{"intVal": 4321}]}]}]}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .and(body_partial_json(json!({
            "aggregateBy": [{
                "dataSourceId": "derived:com.google.calories.expended:com.google.android.gms:merge_calories_expended"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": [{"dataset": [{"point": []}]}]
        })))
        .mount(&server)
        .await;

    let store = store_with(&[("google", "g-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let steps = hub
        .get_metric(MetricQuery::new(Metric::Steps, USER, day()))
        .await
        .unwrap();
    assert_eq!(steps, results(&[("google", 4321.0)]));

    // No data points is a zero, not a failure.
    let calories = hub
        .get_metric(MetricQuery::new(Metric::Calories, USER, day()))
        .await
        .unwrap();
    assert_eq!(calories, results(&[("google", 0.0)]));
}

#[tokio::test]
async fn test_google_calories_drop_fraction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": [{"dataset": [{"point": [
                {"value": [{"fpVal": 1200.6}]},
                {"value": [{"fpVal": 599.3}]}
            ]}]}]
        })))
        .mount(&server)
        .await;

    let store = store_with(&[("google", "g-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let calories = hub
        .get_metric(MetricQuery::new(Metric::Calories, USER, day()))
        .await
        .unwrap();
    assert_eq!(calories, results(&[("google", 1799.0)]));
}

// ═══════════════════════════════════════════════════════════════════════════
// PERIODS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_distance_over_period() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/-/activities/distance/date/2024-01-15/7d.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities-distance": [
                {"dateTime": "2024-01-15", "value": "1.5"},
                {"dateTime": "2024-01-16", "value": "oops"},
                {"dateTime": "2024-01-17", "value": "2.5"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .and(body_partial_json(json!({
            "bucketByTime": {"durationMillis": 608_400_000},
            "endTimeMillis": 1_705_885_200_000i64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": [{"dataset": [{"point": [{"value": [{"fpVal": 20000.0}]}]}]}]
        })))
        .mount(&server)
        .await;

    let store = store_with(&[
        ("fitbit", "fb-token"),
        ("google", "g-token"),
        ("strava", "st-token"),
    ])
    .await;
    let hub = test_hub(&server.uri(), store);

    // Strava has no period endpoint and drops out.
    let distance = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()).with_period(Period::SevenDays))
        .await
        .unwrap();
    assert_eq!(distance, results(&[("fitbit", 4.0), ("google", 20.0)]));
}

#[tokio::test]
async fn test_period_requires_distance() {
    let server = MockServer::start().await;
    let store = store_with(&[("fitbit", "fb-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let result = hub
        .get_metric(MetricQuery::new(Metric::Steps, USER, day()).with_period(Period::OneWeek))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURE ISOLATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_one_provider_failing_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/-/activities/date/2024-01-15.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;
    mount_strava_day(&server, json!([{"distance": 3000.0}])).await;

    let store = store_with(&[("fitbit", "fb-token"), ("strava", "st-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let distance = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap();
    assert_eq!(distance, results(&[("strava", 3.0)]));
}

#[tokio::test]
async fn test_fitbit_error_payload_is_failure() {
    let server = MockServer::start().await;
    mount_fitbit_day(
        &server,
        json!({"errors": [{"errorType": "validation", "message": "Invalid date"}]}),
    )
    .await;

    let store = store_with(&[("fitbit", "fb-token")]).await;
    let hub = test_hub(&server.uri(), store);

    let result = hub
        .get_metric(MetricQuery::new(Metric::Steps, USER, day()))
        .await;
    assert!(matches!(result, Err(AppError::NoDataAvailable)));
}

#[tokio::test]
async fn test_all_providers_failing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/me/dataset:aggregate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 403, "message": "insufficient permissions"}
        })))
        .mount(&server)
        .await;

    let store = store_with(&[
        ("fitbit", "fb-token"),
        ("google", "g-token"),
        ("strava", "st-token"),
    ])
    .await;
    let hub = test_hub(&server.uri(), store);

    let result = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await;
    assert!(matches!(result, Err(AppError::NoDataAvailable)));
}

#[tokio::test]
async fn test_no_linked_providers() {
    let server = MockServer::start().await;
    let hub = test_hub(&server.uri(), Arc::new(MemoryStore::new()));

    let result = hub
        .get_metric(MetricQuery::new(Metric::Steps, USER, day()))
        .await;
    assert!(matches!(result, Err(AppError::NoDataAvailable)));
}

#[tokio::test]
async fn test_unknown_linked_provider_is_ignored() {
    let server = MockServer::start().await;
    mount_strava_day(&server, json!([{"distance": 1000.0}])).await;

    let store = store_with(&[("strava", "st-token")]).await;
    store.put_credential(USER, "garmin", "oauth2;Bearer;;x;y;").await.unwrap();
    let hub = test_hub(&server.uri(), store);

    let distance = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap();
    assert_eq!(distance, results(&[("strava", 1.0)]));
}

#[tokio::test]
async fn test_corrupt_credential_fails_request() {
    let server = MockServer::start().await;
    mount_strava_day(&server, json!([{"distance": 1000.0}])).await;

    let store = store_with(&[("strava", "st-token")]).await;
    store.put_credential(USER, "fitbit", "oauth2;Bearer;").await.unwrap();
    let hub = test_hub(&server.uri(), store);

    let err = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CorruptCredential(_)));
    assert_eq!(err.category(), ErrorCategory::Internal);
    assert_eq!(err.public_message(), AppError::TRY_AGAIN_LATER);
}

#[tokio::test]
async fn test_unsupported_connection_kind_fails_request() {
    let server = MockServer::start().await;
    mount_strava_day(&server, json!([{"distance": 1000.0}])).await;

    let store = store_with(&[("strava", "st-token")]).await;
    store.put_credential(USER, "fitbit", "apikey;abc;").await.unwrap();
    let hub = test_hub(&server.uri(), store);

    let err = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnsupportedConnectionKind(ref kind) if kind == "apikey"));
    assert_eq!(err.category(), ErrorCategory::Internal);
    assert_eq!(err.public_message(), AppError::TRY_AGAIN_LATER);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/-/activities/date/2024-01-15.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"summary": {"steps": 1}}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_strava_day(&server, json!([{"distance": 2000.0}])).await;

    let store = store_with(&[("fitbit", "fb-token"), ("strava", "st-token")]).await;
    let config = config_with_timeout(Duration::from_millis(300));
    let hub = test_hub_with_config(&config, &server.uri(), store);

    let started = std::time::Instant::now();
    let distance = hub
        .get_metric(MetricQuery::new(Metric::Distance, USER, day()))
        .await
        .unwrap();

    assert_eq!(distance, results(&[("strava", 2.0)]));
    assert!(started.elapsed() < Duration::from_secs(5));
}
