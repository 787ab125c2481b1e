//! Tests for the logs that the search layer emits.
//!
//! The web server logs from its own worker threads, which a per-test
//! subscriber cannot see, so these drive the search layer directly.

use crate::LogWatcher;
use cadence::{NopMetricSink, StatsdClient};
use formulary_search::{Aggregator, Executor, Resource};
use formulary_settings::Settings;
use httpmock::{Method::GET, MockServer};
use serde_json::json;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt};

/// Build an aggregator that talks to `upstream`.
fn aggregator_for(upstream: &MockServer) -> Aggregator {
    let mut settings = Settings::load_for_tests();
    settings.upstream.base_url = upstream.base_url();
    let executor = Executor::new(&settings.upstream).expect("could not build executor");
    Aggregator::new(
        Arc::new(executor),
        &settings.search,
        StatsdClient::from_sink("formulary-test", NopMetricSink),
    )
}

#[actix_rt::test]
async fn failed_fields_are_logged_as_warnings() {
    let mut log_watcher = LogWatcher::default();
    let writer = log_watcher.make_writer();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("debug"))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(move || writer.clone()),
        );
    let _guard = tracing::subscriber::set_default(subscriber);

    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path("/drug/ndc.json")
                .query_param("search", "route:oral");
            then.status(502).body("");
        })
        .await;
    upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path("/drug/ndc.json")
                .query_param("search", "dosage_form:oral");
            then.status(200).json_body(json!({
                "meta": {"results": {"total": 1}},
                "results": [{"product_id": "p-1"}]
            }));
        })
        .await;

    let envelope = aggregator_for(&upstream)
        .aggregate(Resource::Ndc, "oral", 20)
        .await;
    assert_eq!(envelope.total(), 1);

    assert!(log_watcher.has(|event| {
        event.level == Level::WARN
            && event.field_contains("type", "search.aggregate.field-error")
            && event.field_contains("field", "route")
            && event.field_contains("error_kind", "upstream")
    }));
    // Fields that found nothing are not failures.
    assert!(!log_watcher.has(|event| {
        event.field_contains("type", "search.aggregate.field-error")
            && event.field_contains("field", "brand_name")
    }));
}

#[actix_rt::test]
async fn upstream_requests_are_logged_without_search_terms() {
    let mut log_watcher = LogWatcher::default();
    let writer = log_watcher.make_writer();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("debug"))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(move || writer.clone()),
        );
    let _guard = tracing::subscriber::set_default(subscriber);

    let upstream = MockServer::start_async().await;
    aggregator_for(&upstream)
        .aggregate(Resource::Label, "a-secret-term", 20)
        .await;

    let requests: Vec<_> = log_watcher
        .events()
        .filter(|event| event.field_contains("type", "search.executor.request"))
        .collect();
    assert_eq!(requests.len(), Resource::Label.field_table().len());
    assert!(requests.iter().all(|event| !event
        .fields
        .values()
        .any(|value| value.to_string().contains("a-secret-term"))));
}
