//! Tests for the search API, run against a mock upstream.

use crate::{formulary_test, TestingTools};
use httpmock::Method::GET;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// An upstream payload holding `results`, with the given upstream total.
fn upstream_page(results: Value, total: u64) -> Value {
    json!({
        "meta": {
            "disclaimer": "Do not rely on openFDA to make decisions regarding medical care.",
            "results": {"skip": 0, "limit": 10, "total": total}
        },
        "results": results
    })
}

#[actix_rt::test]
async fn search_all_merges_and_deduplicates() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let brand = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/drugsfda.json")
                        .query_param("search", "openfda.brand_name:aspirin")
                        .query_param("limit", "10");
                    then.status(200).json_body(upstream_page(
                        json!([
                            {"application_number": "A1", "sponsor_name": "one"},
                            {"application_number": "A2", "sponsor_name": "two"},
                            {"application_number": "A3", "sponsor_name": "three"},
                        ]),
                        250,
                    ));
                })
                .await;
            let generic = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/drugsfda.json")
                        .query_param("search", "openfda.generic_name:aspirin");
                    then.status(200).json_body(upstream_page(
                        json!([
                            {"application_number": "A2", "sponsor_name": "two again"},
                            {"application_number": "A4", "sponsor_name": "four"},
                        ]),
                        80,
                    ));
                })
                .await;

            let response = test_client
                .get("/api/drugsfda/search/all?query=aspirin")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(
                body,
                json!({
                    "results": [
                        {"application_number": "A1", "sponsor_name": "one"},
                        {"application_number": "A2", "sponsor_name": "two"},
                        {"application_number": "A3", "sponsor_name": "three"},
                        {"application_number": "A4", "sponsor_name": "four"},
                    ],
                    "meta": {"results": {"total": 4}}
                })
            );
            brand.assert_async().await;
            generic.assert_async().await;
        },
    )
    .await
}

#[actix_rt::test]
async fn search_all_truncates_but_counts_everything() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/drugsfda.json")
                        .query_param("search", "openfda.brand_name:aspirin");
                    then.status(200).json_body(upstream_page(
                        json!([
                            {"application_number": "A1"},
                            {"application_number": "A2"},
                            {"application_number": "A3"},
                        ]),
                        3,
                    ));
                })
                .await;
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/drugsfda.json")
                        .query_param("search", "openfda.generic_name:aspirin");
                    then.status(200).json_body(upstream_page(
                        json!([{"application_number": "A2"}, {"application_number": "A4"}]),
                        2,
                    ));
                })
                .await;

            let body: Value = test_client
                .get("/api/drugsfda/search/all?query=aspirin&limit=2")
                .send()
                .await
                .expect("failed to execute request")
                .json()
                .await
                .expect("response was not json");

            assert_eq!(
                body,
                json!({
                    "results": [{"application_number": "A1"}, {"application_number": "A2"}],
                    "meta": {"results": {"total": 4}}
                })
            );
        },
    )
    .await
}

#[actix_rt::test]
async fn search_all_survives_a_slow_upstream() {
    formulary_test(
        |settings| settings.upstream.timeout = Duration::from_secs(1),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/drug/drugsfda.json");
                    then.status(200)
                        .delay(Duration::from_secs(3))
                        .json_body(upstream_page(json!([{"application_number": "A1"}]), 1));
                })
                .await;

            let response = test_client
                .get("/api/drugsfda/search/all?query=aspirin")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, json!({"results": [], "meta": {"results": {"total": 0}}}));
        },
    )
    .await
}

#[actix_rt::test]
async fn search_all_skips_failing_fields() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/ndc.json")
                        .query_param("search", "brand_name:advil");
                    then.status(500).body("oops");
                })
                .await;
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/ndc.json")
                        .query_param("search", "generic_name:advil");
                    then.status(200)
                        .json_body(upstream_page(json!([{"product_id": "p-1"}]), 1));
                })
                .await;

            let body: Value = test_client
                .get("/api/ndc/search/all?query=advil")
                .send()
                .await
                .expect("failed to execute request")
                .json()
                .await
                .expect("response was not json");

            assert_eq!(
                body,
                json!({"results": [{"product_id": "p-1"}], "meta": {"results": {"total": 1}}})
            );
        },
    )
    .await
}

#[actix_rt::test]
async fn search_all_requires_a_query() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/api/label/search/all")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, json!({"detail": "missing query parameter `query`"}));
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_forwards_the_upstream_payload() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let payload = upstream_page(
                json!([{"set_id": "s-1", "boxed_warning": ["WARNING: ..."]}]),
                1312,
            );
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/label.json")
                        .query_param("search", "_exists_:boxed_warning")
                        .query_param("limit", "5");
                    then.status(200).json_body(payload.clone());
                })
                .await;

            let response = test_client
                .get("/api/label/boxed-warning?limit=5")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, payload);
            mock.assert_async().await;
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_forwards_payloads_without_metadata() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let payload = json!({"results": [{"product_ndc": "0573-0150"}, "unexpected"]});
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/ndc.json")
                        .query_param("search", "product_ndc:0573-0150");
                    then.status(200).json_body(payload.clone());
                })
                .await;

            let response = test_client
                .get("/api/ndc/product-ndc?ndc=0573-0150")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, payload);
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_clamps_the_limit() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/ndc.json")
                        .query_param("search", "brand_name:advil")
                        .query_param("limit", "99");
                    then.status(200).json_body(upstream_page(json!([]), 0));
                })
                .await;

            let response = test_client
                .get("/api/ndc/brand-name?name=advil&limit=1000")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            mock.assert_async().await;
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_treats_not_found_as_empty() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/drug/ndc.json");
                    then.status(404).json_body(json!({
                        "error": {"code": "NOT_FOUND", "message": "No matches found!"}
                    }));
                })
                .await;

            let response = test_client
                .get("/api/ndc/generic-name?name=nothing")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, json!({"results": [], "meta": {"results": {"total": 0}}}));
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_forwards_upstream_errors() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/drug/drugsfda.json");
                    then.status(400).json_body(json!({
                        "error": {"code": "BAD_REQUEST", "message": "Syntax error in search"}
                    }));
                })
                .await;

            let response = test_client
                .get("/api/drugsfda/search?query=lipitor&field=sponsor_name")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, json!({"detail": "Syntax error in search"}));
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_reports_server_errors() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            upstream_mock
                .mock_async(|when, then| {
                    when.method(GET).path("/drug/label.json");
                    then.status(500).body("");
                })
                .await;

            let response = test_client
                .get("/api/label/warnings?query=drowsiness")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await.expect("response was not json");
            assert_eq!(body, json!({"detail": "Internal Server Error"}));
        },
    )
    .await
}

#[actix_rt::test]
async fn field_search_validates_parameters() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let catch_all = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET);
                    then.status(200).json_body(upstream_page(json!([]), 0));
                })
                .await;

            for (path, status) in [
                ("/api/ndc/brand-name", StatusCode::BAD_REQUEST),
                ("/api/ndc/brand-name?name=advil&limit=-3", StatusCode::BAD_REQUEST),
                ("/api/label/date-range?start_date=20200101", StatusCode::BAD_REQUEST),
                ("/api/label/not-an-endpoint?query=x", StatusCode::NOT_FOUND),
            ] {
                let response = test_client
                    .get(path)
                    .send()
                    .await
                    .expect("failed to execute request");
                assert_eq!(response.status(), status, "{}", path);
            }
            catch_all.assert_hits_async(0).await;
        },
    )
    .await
}

#[actix_rt::test]
async fn date_range_reaches_the_upstream() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let mock = upstream_mock
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/label.json")
                        .query_param("search", "effective_time:[20200101 TO 20201231]");
                    then.status(200).json_body(upstream_page(json!([]), 0));
                })
                .await;

            let response = test_client
                .get("/api/label/date-range?start_date=20200101&end_date=20201231")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            mock.assert_async().await;
        },
    )
    .await
}
