//! Tests that Formulary reports metrics about its work.

use crate::{formulary_test, TestingTools};
use httpmock::Method::GET;
use reqwest::StatusCode;
use serde_json::json;
use statsd_parser::Metric;

#[actix_rt::test]
async fn requests_are_timed() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             mut metrics_watcher,
             ..
         }| async move {
            let response = test_client
                .get("/__heartbeat__")
                .send()
                .await
                .expect("failed to execute request");
            assert_eq!(response.status(), StatusCode::OK);

            assert!(metrics_watcher.has(|msg| {
                msg.name == "request.duration" && matches!(msg.metric, Metric::Timing(_))
            }));
        },
    )
    .await
}

#[actix_rt::test]
async fn aggregate_reports_failed_fields_and_result_counts() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             mut metrics_watcher,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/label.json")
                        .query_param("search", "warnings:drowsiness");
                    then.status(503).body("");
                })
                .await;
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/label.json")
                        .query_param("search", "indications_and_usage:drowsiness");
                    then.status(200).json_body(json!({
                        "meta": {"results": {"total": 2}},
                        "results": [{"set_id": "s-1"}, {"set_id": "s-2"}]
                    }));
                })
                .await;

            let response = test_client
                .get("/api/label/search/all?query=drowsiness")
                .send()
                .await
                .expect("failed to execute request");
            assert_eq!(response.status(), StatusCode::OK);

            assert!((metrics_watcher.count("search.aggregate.field_error") - 1.0).abs() < 0.0001);
            assert!(metrics_watcher.has_histogram("search.aggregate.results", 2.0));
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_counts_upstream_errors() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             mut metrics_watcher,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/drug/ndc.json");
                    then.status(429).json_body(json!({
                        "error": {"code": "OVER_RATE_LIMIT", "message": "API rate limit exceeded"}
                    }));
                })
                .await;

            let response = test_client
                .get("/api/ndc/route?route=oral")
                .send()
                .await
                .expect("failed to execute request");
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

            assert!((metrics_watcher.count("search.field.upstream_error") - 1.0).abs() < 0.0001);
        },
    )
    .await
}
