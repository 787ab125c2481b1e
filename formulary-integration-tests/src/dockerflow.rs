//! Tests that Formulary conforms to [Dockerflow](https://github.com/mozilla-services/dockerflow).

use crate::{formulary_test, TestingTools};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

#[actix_rt::test]
async fn lbheartbeat_works() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/__lbheartbeat__")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.content_length(), Some(0));
        },
    )
    .await
}

#[actix_rt::test]
async fn heartbeat_works() {
    formulary_test(
        |_| (),
        |TestingTools {
             test_client,
             upstream_mock,
             ..
         }| async move {
            let response = test_client
                .get("/__heartbeat__")
                .send()
                .await
                .expect("failed to execute request");

            assert!(response.status().is_success());
            assert_eq!(
                response
                    .headers()
                    .get_all("content-type")
                    .iter()
                    .collect::<Vec<_>>(),
                vec!["application/json"]
            );
            let body: Value = response.json().await.expect("heartbeat was not json");
            assert_eq!(
                body["searcher"],
                Value::String(format!("Executor({})", upstream_mock.base_url()))
            );
        },
    )
    .await
}

#[actix_rt::test]
async fn version_works() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/__version__")
                .send()
                .await
                .expect("failed to execute request");

            assert!(response.status().is_success());
            assert_eq!(
                response
                    .headers()
                    .get_all("content-type")
                    .iter()
                    .collect::<Vec<_>>(),
                vec!["application/json"]
            );

            #[derive(Deserialize, Debug)]
            #[allow(dead_code)]
            struct VersionInfo {
                source: String,
                version: String,
                commit: String,
                build: String,
            }
            let body: Result<VersionInfo, _> = response.json().await;
            assert!(body.is_ok());
        },
    )
    .await
}

#[actix_rt::test]
async fn error_works() {
    formulary_test(
        |_| (),
        |TestingTools { test_client, .. }| async move {
            let response = test_client
                .get("/__error__")
                .send()
                .await
                .expect("failed to execute request");

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await.expect("error was not json");
            assert_eq!(body, serde_json::json!({"detail": "Internal error"}));
        },
    )
    .await
}
