//! Tools for running tests

use crate::utils::metrics::MetricsWatcher;
use formulary_settings::Settings;
use httpmock::MockServer;
use reqwest::{redirect, Client, ClientBuilder, RequestBuilder};
use std::{future::Future, net::TcpListener};

/// Run a test with a fully configured Formulary server.
///
/// The server will listen on a port assigned arbitrarily by the OS, and sends
/// every upstream search to a fresh mock server.
///
/// A suite of tools will be passed to the test function in the form of an
/// instance of [`TestingTools`]. It includes an HTTP client configured to use
/// the test server, the mock upstream, and a watcher that can make assertions
/// about the metrics the server sent.
///
/// # Example
///
/// ```
/// # use formulary_integration_tests::{formulary_test, TestingTools};
/// #[actix_rt::test]
/// async fn a_test() {
///     formulary_test(
///         |settings| settings.debug = false,
///         |TestingTools { test_client, upstream_mock, .. }| async move {
///             assert!(true) // Test goes here
///         }
///     ).await
/// }
/// ```
///
/// # Panics
/// May panic if tests could not be set up correctly.
pub async fn formulary_test<FSettings, FTest, Fut>(
    settings_changer: FSettings,
    test: FTest,
) -> Fut::Output
where
    FSettings: FnOnce(&mut Settings),
    FTest: FnOnce(TestingTools) -> Fut,
    Fut: Future,
{
    let mut settings = Settings::load_for_tests();

    // Any request the test does not mock gets httpmock's 404, which the
    // server treats as an empty result.
    let upstream_mock = MockServer::start_async().await;
    settings.upstream.base_url = upstream_mock.base_url();

    settings_changer(&mut settings);

    assert_eq!(
        settings.metrics.sink_host, "0.0.0.0",
        "Tests cannot change the metrics sink host, since it is ignored"
    );
    assert_eq!(
        settings.metrics.sink_port, 8125,
        "Tests cannot change the metrics sink address, since it is ignored"
    );
    let (metrics_watcher, metrics_client) = MetricsWatcher::new_with_client();

    // Run server in the background
    let listener = TcpListener::bind(settings.http.listen).expect("Failed to bind to a port");
    let address = listener
        .local_addr()
        .expect("Listener has no address")
        .to_string();
    let server =
        formulary_web::run(listener, metrics_client, settings).expect("Failed to start server");
    let server_handle = server.handle();
    let server_task = actix_rt::spawn(server);
    let test_client = TestReqwestClient::new(address);

    let tools = TestingTools {
        test_client,
        upstream_mock,
        metrics_watcher,
    };
    let rv = test(tools).await;

    server_handle.stop(false).await;
    server_task.abort();
    rv
}

/// A set of tools for tests, including mock servers and metrics helpers.
///
/// The fields of this struct are marked as non-exhaustive, meaning that any
/// destructuring of this struct will require a `..` "and the rest" entry, even
/// if all present items are named. This makes adding tools in the future easier,
/// since old tests won't need to be rewritten to account for the added tools.
#[non_exhaustive]
pub struct TestingTools {
    /// A wrapper around a `reqwest::client` that automatically uses the
    /// Formulary server under test.
    pub test_client: TestReqwestClient,

    /// The [`httpmock::MockServer`] the server uses as its upstream. Contains
    /// no mocks, any needed must be added by the test.
    pub upstream_mock: MockServer,

    /// To make assertions about metrics.
    pub metrics_watcher: MetricsWatcher,
}

/// A wrapper around a `[reqwest::client]` that automatically sends requests to
/// the test server.
///
/// This only handles `GET` requests, the only method the API serves.
///
/// The client is configured to not follow any redirects.
pub struct TestReqwestClient {
    /// The wrapped client.
    client: Client,

    /// The server address to implicitly use for all requests.
    address: String,
}

impl TestReqwestClient {
    /// Construct a new test client that uses `address` for every request given.
    pub fn new(address: String) -> Self {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::none())
            .build()
            .expect("Could not build test client");
        Self { client, address }
    }

    /// Start building a GET request to the test server with the path specified.
    ///
    /// The path should start with `/`, such as `/__heartbeat__`.
    pub fn get(&self, path: &str) -> RequestBuilder {
        assert!(path.starts_with('/'));
        let url = format!("http://{}{}", &self.address, path);
        self.client.get(url)
    }
}
