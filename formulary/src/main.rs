// Only overview documentation that is not relevant to one of the more specific
// crates should go here.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! A web API that proxies searches to the openFDA drug APIs.
//!
//! Formulary is split into several subcrates that work in collaboration.
//!
//! - [formulary-integration-tests](../formulary_integration_tests/index.html)
//! - [formulary-search](../formulary_search/index.html)
//! - [formulary-settings](../formulary_settings/index.html)
//! - [formulary-web](../formulary_web/index.html)

mod docs;

use anyhow::{Context, Result};
use cadence::{BufferedUdpMetricSink, QueuingMetricSink, StatsdClient};
use formulary_settings::{LogFormat, Settings};
use std::net::{TcpListener, UdpSocket};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Primary entry point
#[actix_rt::main]
async fn main() -> Result<()> {
    let settings = formulary_settings::Settings::load().context("Loading settings")?;
    init_logging(&settings).context("initializing logging")?;
    let metrics_client = init_metrics(&settings).context("initializing metrics")?;
    let listener = TcpListener::bind(settings.http.listen).context("Binding port")?;

    tracing::info!(
        r#type = "app.starting",
        listen = %settings.http.listen,
        upstream = %settings.upstream.base_url,
        "Starting formulary"
    );

    formulary_web::run(listener, metrics_client, settings)
        .context("Starting formulary-web server")?
        .await
        .context("Running formulary-web server")?;

    Ok(())
}

/// Set up logging for Formulary, based on settings and the `RUST_LOG` environment variable.
fn init_logging(settings: &Settings) -> Result<()> {
    LogTracer::init()?;
    let env_filter: EnvFilter = (&settings.logging.levels).into();

    match settings.logging.format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty());
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact());
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    };

    Ok(())
}

/// Set up a statsd client that sends metrics to the configured sink.
fn init_metrics(settings: &Settings) -> Result<StatsdClient> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Binding metrics socket")?;
    socket
        .set_nonblocking(true)
        .context("Configuring metrics socket")?;
    let address = (settings.metrics.sink_host.as_str(), settings.metrics.sink_port);
    let udp_sink = BufferedUdpMetricSink::from(address, socket)
        .context("Creating metrics sink")?;
    let sink = QueuingMetricSink::from(udp_sink);

    Ok(StatsdClient::builder("formulary", sink)
        .with_error_handler(|error| {
            tracing::warn!(r#type = "metrics.send-error", %error, "Could not send metric");
        })
        .build())
}
