//! Tests for behavior that is not specific to any one endpoint.

use crate::{formulary_test, TestingTools};
use reqwest::{header::LOCATION, StatusCode};

#[actix_rt::test]
async fn root_describes_the_service() {
    formulary_test(
        |settings| settings.public_documentation = None,
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            let body = response.text().await.expect("body was not text");
            assert!(body.contains("openFDA"));
        },
    )
    .await
}

#[actix_rt::test]
async fn root_redirects_to_documentation() {
    formulary_test(
        |settings| {
            settings.public_documentation = Some(
                "https://docs.example.com/formulary"
                    .parse()
                    .expect("bad test uri"),
            );
        },
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(
                response.headers().get(LOCATION).map(|value| value.as_bytes()),
                Some(&b"https://docs.example.com/formulary"[..])
            );
        },
    )
    .await
}

#[actix_rt::test]
async fn unknown_paths_are_not_found() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            for path in ["/nothing-here", "/api/devices/search/all?query=x"] {
                let response = test_client
                    .get(path)
                    .send()
                    .await
                    .expect("failed to execute request");
                assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
            }
        },
    )
    .await
}

#[actix_rt::test]
async fn cors_is_permissive() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/__lbheartbeat__")
                .header("Origin", "https://app.example.com")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            assert!(response
                .headers()
                .contains_key("access-control-allow-origin"));
        },
    )
    .await
}
