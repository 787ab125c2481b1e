//! A field searcher that queries the upstream drug information API over HTTP.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use formulary_settings::UpstreamSettings;
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::{Envelope, FieldQuery, FieldSearcher, SearchError};

/// Runs each [`FieldQuery`] as one HTTP request against the upstream API.
pub struct Executor {
    /// The HTTP client, shared by every request. Carries the per-call timeout.
    client: reqwest::Client,

    /// Scheme and host of the upstream, without a trailing slash.
    base_url: String,

    /// Whether to quote terms that contain query syntax.
    escape_terms: bool,
}

/// The error body the upstream sends along with error statuses.
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    /// The error details.
    error: UpstreamErrorDetail,
}

/// The `error` object of [`UpstreamErrorBody`].
#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    /// A description of the error, such as "Invalid search query".
    message: String,
}

impl Executor {
    /// Create an executor from settings.
    ///
    /// # Errors
    /// If the HTTP client cannot be created.
    pub fn new(settings: &UpstreamSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("Unable to create the Reqwest client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            escape_terms: settings.escape_terms,
        })
    }
}

#[async_trait]
impl FieldSearcher for Executor {
    fn name(&self) -> String {
        format!("Executor({})", self.base_url)
    }

    async fn search(&self, query: FieldQuery) -> Result<Value, SearchError> {
        let url = format!("{}{}", self.base_url, query.resource().path());
        let search = query.clause().to_search_expression(self.escape_terms);
        let limit = query.limit().to_string();

        tracing::debug!(
            r#type = "search.executor.request",
            resource = %query.resource(),
            field = query.clause().field(),
            limit = query.limit(),
            "Querying upstream"
        );

        let response = self
            .client
            .get(&url)
            .query(&[("search", search.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|error| {
                let context = if error.is_timeout() {
                    "upstream request timed out"
                } else {
                    "could not reach upstream"
                };
                SearchError::Internal(anyhow::Error::new(error).context(context))
            })?;

        // Convert through the raw code so this works with whichever `http`
        // version reqwest was built against.
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|error| SearchError::Internal(error.into()))?;

        if status == StatusCode::NOT_FOUND {
            return Ok(Envelope::empty_payload());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream {
                status,
                message: upstream_message(status, &body),
            });
        }

        // The payload is forwarded as-is, so only require that it is JSON.
        response.json::<Value>().await.map_err(|error| {
            SearchError::Internal(anyhow!("Failed to parse the JSON response: {}", error))
        })
    }
}

/// Describe an upstream failure, preferring the message the upstream sent.
fn upstream_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<UpstreamErrorBody>(body)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("upstream error")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::{upstream_message, Executor};
    use crate::{Clause, Envelope, FieldQuery, FieldSearcher, Resource, SearchError};
    use serde_json::Value;
    use formulary_settings::Settings;
    use http::StatusCode;
    use httpmock::{Method::GET, MockServer};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn executor_for(server: &MockServer, change: impl FnOnce(&mut Settings)) -> Executor {
        let mut settings = Settings::load_for_tests();
        settings.upstream.base_url = server.base_url();
        change(&mut settings);
        Executor::new(&settings.upstream).expect("could not build executor")
    }

    #[tokio::test]
    async fn success_forwards_the_payload() {
        let server = MockServer::start_async().await;
        let payload = json!({
            "meta": {"disclaimer": "x", "results": {"skip": 0, "limit": 2, "total": 7}},
            "results": [{"product_id": "a"}, {"product_id": "b"}]
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/drug/ndc.json")
                    .query_param("search", "brand_name:advil")
                    .query_param("limit", "2");
                then.status(200).json_body(payload.clone());
            })
            .await;

        let executor = executor_for(&server, |_| ());
        let forwarded = executor
            .search(FieldQuery::matching(Resource::Ndc, "brand_name", "advil", 2))
            .await
            .expect("search should succeed");

        mock.assert_async().await;
        assert_eq!(forwarded, payload);
    }

    #[tokio::test]
    async fn limit_is_clamped_on_the_wire() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/drug/label.json").query_param("limit", "99");
                then.status(200).json_body(json!({"results": [], "meta": {"results": {"total": 0}}}));
            })
            .await;

        let executor = executor_for(&server, |_| ());
        executor
            .search(FieldQuery::matching(Resource::Label, "warnings", "drowsiness", 1000))
            .await
            .expect("search should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_an_empty_envelope() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/drug/drugsfda.json");
                then.status(404).json_body(json!({
                    "error": {"code": "NOT_FOUND", "message": "No matches found!"}
                }));
            })
            .await;

        let executor = executor_for(&server, |_| ());
        let forwarded = executor
            .search(FieldQuery::matching(
                Resource::DrugsFda,
                "openfda.brand_name",
                "nothing",
                10,
            ))
            .await
            .expect("not found is not an error");
        assert_eq!(forwarded, Envelope::empty_payload());
    }

    #[tokio::test]
    async fn error_status_is_reported_with_the_upstream_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/drug/ndc.json");
                then.status(400).json_body(json!({
                    "error": {"code": "BAD_REQUEST", "message": "Invalid search query"}
                }));
            })
            .await;

        let executor = executor_for(&server, |_| ());
        let error = executor
            .search(FieldQuery::matching(Resource::Ndc, "route", "oral", 10))
            .await
            .expect_err("400 is an error");
        match error {
            SearchError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid search query");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn payloads_of_any_shape_are_forwarded() {
        let server = MockServer::start_async().await;
        let payloads = [
            json!({"results": [{"application_number": "A1"}]}),
            json!({"results": ["not a record"], "meta": {"results": {"total": "unknown"}}}),
            json!({"error": "but with a 200 status"}),
        ];
        for (n, payload) in payloads.iter().enumerate() {
            let term = format!("term{}", n);
            server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/drug/drugsfda.json")
                        .query_param("search", format!("application_number:{}", term));
                    then.status(200).json_body(payload.clone());
                })
                .await;
        }

        let executor = executor_for(&server, |_| ());
        for (n, payload) in payloads.iter().enumerate() {
            let forwarded: Value = executor
                .search(FieldQuery::matching(
                    Resource::DrugsFda,
                    "application_number",
                    &format!("term{}", n),
                    10,
                ))
                .await
                .expect("any JSON is forwarded");
            assert_eq!(&forwarded, payload);
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_internal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/drug/ndc.json");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let executor = executor_for(&server, |_| ());
        let error = executor
            .search(FieldQuery::matching(Resource::Ndc, "route", "oral", 10))
            .await
            .expect_err("html is not an envelope");
        assert!(matches!(error, SearchError::Internal(_)));
    }

    #[tokio::test]
    async fn slow_upstream_is_internal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/drug/ndc.json");
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(json!({"results": [], "meta": {"results": {"total": 0}}}));
            })
            .await;

        let executor = executor_for(&server, |settings| {
            settings.upstream.timeout = Duration::from_secs(1)
        });
        let error = executor
            .search(FieldQuery::matching(Resource::Ndc, "route", "oral", 10))
            .await
            .expect_err("should time out");
        assert!(matches!(error, SearchError::Internal(_)));
    }

    #[tokio::test]
    async fn terms_are_escaped_when_configured() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/drug/ndc.json")
                    .query_param("search", r#"brand_name:"advil pm""#);
                then.status(200).json_body(json!({"results": [], "meta": {"results": {"total": 0}}}));
            })
            .await;

        let executor = executor_for(&server, |_| ());
        executor
            .search(FieldQuery::matching(Resource::Ndc, "brand_name", "advil pm", 10))
            .await
            .expect("search should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn range_queries_reach_the_upstream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/drug/label.json")
                    .query_param("search", "effective_time:[20200101 TO 20201231]");
                then.status(200).json_body(json!({"results": [], "meta": {"results": {"total": 0}}}));
            })
            .await;

        let executor = executor_for(&server, |_| ());
        let clause = Clause::Range {
            field: "effective_time".to_string(),
            start: "20200101".to_string(),
            end: "20201231".to_string(),
        };
        executor
            .search(FieldQuery::new(Resource::Label, clause, 10))
            .await
            .expect("search should succeed");
        mock.assert_async().await;
    }

    #[test]
    fn upstream_message_falls_back_to_the_status_reason() {
        assert_eq!(
            upstream_message(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            "Too Many Requests"
        );
    }
}
