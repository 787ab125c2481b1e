//! An actix-web service to implement [Dockerflow](https://github.com/mozilla-services/Dockerflow).

use std::collections::HashMap;

use actix_web::{get, web, HttpResponse};
use serde_json::Value;

use crate::{errors::HandlerError, providers::SearchProviderRef};

/// Handles required Dockerflow Endpoints.
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .service(lbheartbeat)
        .service(heartbeat)
        .service(version)
        .service(test_error);
}

/// Used by the load balancer to indicate that the server can respond to
/// requests. Should just return OK.
#[get("__lbheartbeat__")]
async fn lbheartbeat() -> HttpResponse {
    HttpResponse::Ok().body("")
}

/// Return the contents of the `version.json` file created by CI and stored
/// in the Docker root (or the TBD version stored in the Git repo).
#[get("__version__")]
async fn version() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(include_str!("../version.json"))
}

/// Returns a status message indicating the current state of the server.
///
/// The upstream is not contacted, so this only reports which one is in use.
#[get("__heartbeat__")]
async fn heartbeat(providers: web::Data<SearchProviderRef>) -> HttpResponse {
    let mut checklist = HashMap::new();
    checklist.insert(
        "version".to_owned(),
        Value::String(env!("CARGO_PKG_VERSION").to_owned()),
    );
    checklist.insert(
        "searcher".to_owned(),
        Value::String(providers.searcher.name()),
    );
    HttpResponse::Ok().json(checklist)
}

/// Returning an API error to test error handling.
#[get("__error__")]
async fn test_error() -> Result<HttpResponse, HandlerError> {
    tracing::error!(r#type = "dockerflow.error_endpoint", "The __error__ endpoint was called");
    Err(HandlerError::internal())
}
