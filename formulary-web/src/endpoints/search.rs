//! Web handlers for the search API.

use std::collections::HashMap;

use crate::{
    errors::{HandlerError, HandlerErrorKind},
    providers::SearchProviderRef,
};
use actix_web::{
    get,
    web::{self, Data, ServiceConfig},
    HttpResponse,
};
use cadence::{CountedExt, Histogrammed, StatsdClient};
use formulary_search::{endpoints, FieldQuery, Resource, SearchError};
use formulary_settings::Settings;

/// Configure routes to use the search service.
///
/// The aggregate route must be registered before the generic one.
pub fn configure(config: &mut ServiceConfig) {
    config.service(search_all).service(search_field);
}

/// Search every field of a resource for `query`, merging the results.
#[get("/{resource}/search/all")]
#[tracing::instrument(skip_all, fields(resource = %path))]
async fn search_all(
    path: web::Path<String>,
    web::Query(params): web::Query<HashMap<String, String>>,
    providers: Data<SearchProviderRef>,
    metrics_client: Data<StatsdClient>,
    settings: Data<Settings>,
) -> Result<HttpResponse, HandlerError> {
    let resource = parse_resource(&path)?;
    let term = params
        .get("query")
        .ok_or(endpoints::MissingParameter("query"))?;
    let limit = parse_limit(&params)?.unwrap_or(settings.search.aggregate_default_limit);

    safe_log_request(settings.log_full_request, resource, "search/all", term);

    let envelope = providers.aggregator.aggregate(resource, term, limit).await;

    tracing::debug!(
        r#type = "web.search.aggregate-count",
        returned = envelope.results.len(),
        total = envelope.total(),
        "Providing aggregated results"
    );
    metrics_client
        .histogram("search.aggregate.results", envelope.results.len() as u64)
        .ok();

    Ok(HttpResponse::Ok().json(envelope))
}

/// Search one field of a resource, as described by the endpoint table.
#[get("/{resource}/{endpoint}")]
#[tracing::instrument(skip_all, fields(resource = %path.0, endpoint = %path.1))]
async fn search_field(
    path: web::Path<(String, String)>,
    web::Query(params): web::Query<HashMap<String, String>>,
    providers: Data<SearchProviderRef>,
    metrics_client: Data<StatsdClient>,
    settings: Data<Settings>,
) -> Result<HttpResponse, HandlerError> {
    let (resource_slug, endpoint_slug) = path.into_inner();
    let resource = parse_resource(&resource_slug)?;
    let endpoint = endpoints::find(resource, &endpoint_slug).ok_or_else(|| {
        HandlerErrorKind::NotFound(format!("/api/{}/{}", resource, endpoint_slug))
    })?;
    let clause = endpoint.clause(&params)?;
    let limit = parse_limit(&params)?
        .map_or(settings.search.field_default_limit, |limit| {
            u32::try_from(limit).unwrap_or(u32::MAX)
        });

    safe_log_request(
        settings.log_full_request,
        resource,
        endpoint.slug,
        &clause.to_search_expression(false),
    );

    let payload = providers
        .searcher
        .search(FieldQuery::new(resource, clause, limit))
        .await
        .map_err(|error| {
            match &error {
                SearchError::Upstream { status, .. } => {
                    tracing::warn!(
                        r#type = "web.search.upstream-error",
                        status = status.as_u16(),
                        %error,
                        "Upstream rejected search"
                    );
                    metrics_client
                        .incr_with_tags("search.field.upstream_error")
                        .with_tag("status", status.as_str())
                        .send();
                }
                SearchError::Internal(cause) => {
                    tracing::error!(
                        r#type = "web.search.error",
                        error = ?cause,
                        "Error running search"
                    );
                }
            }
            HandlerError::from(error)
        })?;

    Ok(HttpResponse::Ok().json(payload))
}

/// Look up the resource named in the URL.
fn parse_resource(slug: &str) -> Result<Resource, HandlerError> {
    slug.parse::<Resource>()
        .map_err(|_| HandlerErrorKind::NotFound(format!("/api/{}", slug)).into())
}

/// Read the optional `limit` query parameter.
fn parse_limit(params: &HashMap<String, String>) -> Result<Option<usize>, HandlerError> {
    match params.get("limit") {
        None => Ok(None),
        Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
            HandlerErrorKind::InvalidParameter {
                name: "limit",
                value: raw.clone(),
            }
            .into()
        }),
    }
}

/// Log a search request, respecting the `log_full_request` setting, since the
/// search text is user input.
fn safe_log_request(log_query: bool, resource: Resource, endpoint: &str, query: &str) {
    let query = if log_query { query } else { "" };
    tracing::info!(
        r#type = "web.search.request",
        sensitive = true,
        %resource,
        endpoint,
        %query,
        "handling search request"
    );
}
