#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! Web server for [Formulary](../formulary/index.html)'s public API.

mod dockerflow;
mod endpoints;
mod errors;
mod logging;
mod middleware;
pub mod providers;

use actix_cors::Cors;
use actix_web::{
    dev::Server,
    get,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use anyhow::{Context, Result};
use cadence::StatsdClient;
use formulary_settings::Settings;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::{logging::FormularyRootSpanBuilder, providers::SearchProviderRef};

pub use crate::errors::{HandlerError, HandlerErrorKind};

/// Run the web server
///
/// The returned server is a `Future` that must either be `.await`ed, or run it
/// as a background task using `tokio::spawn`.
///
/// Most of the details from `settings` will be respected, except for those that
/// go into building the listener (the host and port). If you want to respect the
/// settings specified in that object, you must include them in the construction
/// of `listener`.
///
/// # Errors
///
/// Returns an error if the search providers cannot be set up, or if the server
/// cannot be started on the provided listener.
///
/// # Examples
///
/// Run the server in the foreground. This will only return if there is an error
/// that causes the server to shut down. This is used to run Formulary as a
/// service, such as in production.
///
/// ```no_run
/// # tokio_test::block_on(async {
/// let listener = std::net::TcpListener::bind("127.0.0.1:8080")
///     .expect("Failed to bind port");
/// let settings = formulary_settings::Settings::load()
///     .expect("Failed to load settings");
/// let metrics_client = cadence::StatsdClient::from_sink("formulary", cadence::NopMetricSink);
/// formulary_web::run(listener, metrics_client, settings)
///     .expect("Failed to start server")
///     .await
///     .expect("Fatal error while running server");
/// # })
/// ```
pub fn run(
    listener: TcpListener,
    metrics_client: StatsdClient,
    settings: Settings,
) -> Result<Server> {
    let providers = SearchProviderRef::init(&settings, &metrics_client)
        .context("Setting up search providers")?;
    let num_workers = settings.http.workers;

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(settings.clone()))
            .app_data(Data::new(metrics_client.clone()))
            // The metrics middleware reads the client without the `Data` wrapper.
            .app_data(metrics_client.clone())
            .app_data(Data::new(providers.clone()))
            .wrap(middleware::Metrics)
            .wrap(TracingLogger::<FormularyRootSpanBuilder>::new())
            .wrap(Cors::permissive())
            // The core functionality of Formulary
            .service(web::scope("api").configure(endpoints::search::configure))
            .service(root_info)
            // Add the behavior necessary to satisfy Dockerflow.
            .service(web::scope("").configure(dockerflow::configure))
    })
    .listen(listener)
    .context("Listening for connections")?;

    if let Some(n) = num_workers {
        server = server.workers(n);
    }

    Ok(server.run())
}

/// The root view, to provide information about what this service is.
///
/// This is intended to be seen by people trying to investigate what this service
/// is. It should redirect to documentation, if it is available, or provide a
/// short message otherwise.
#[get("/")]
async fn root_info(settings: Data<Settings>) -> HttpResponse {
    match &settings.public_documentation {
        Some(redirect_url) => HttpResponse::Found()
            .insert_header(("location", redirect_url.to_string()))
            .finish(),
        None => HttpResponse::Ok().content_type("text/plain").body(
            "Formulary is a proxy for searching the openFDA drug APIs. \
             Searches live under /api/{drugsfda,ndc,label}.",
        ),
    }
}
