//! Middlewares for reporting Metrics in Formulary.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError,
};
use cadence::{StatsdClient, Timed};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    time::Instant,
};

/// Factory for [`MetricsMiddleware`].
pub struct Metrics;

/// Middleware to record request metrics.
pub struct MetricsMiddleware<S> {
    /// The wrapped service.
    service: S,
}

impl<S, B> Transform<S, ServiceRequest> for Metrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;

    type Error = ActixError;

    type Transform = MetricsMiddleware<S>;

    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddleware { service }))
    }
}

impl<S, B> Service<ServiceRequest> for MetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;

    type Error = ActixError;

    #[allow(clippy::type_complexity)]
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        // The route pattern, rather than the path, keeps tag cardinality low.
        let route = req.match_pattern().unwrap_or_else(|| "default".to_string());
        let metrics_client = req.app_data::<StatsdClient>().cloned();
        let fut = self.service.call(req);

        Box::pin(async move {
            let response = fut.await?;
            if let Some(metrics_client) = metrics_client {
                let lapsed = Instant::now().duration_since(start);
                metrics_client
                    .time_with_tags("request.duration", lapsed)
                    .with_tag("route", &route)
                    .with_tag("status", response.status().as_str())
                    .send();
            } else {
                tracing::warn!(
                    r#type = "web.metrics.no-client",
                    "No metrics client configured, but metrics middleware attached"
                );
            }
            Ok(response)
        })
    }
}
