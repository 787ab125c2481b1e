//! Middlewares specific to Formulary.

mod metrics;

pub use self::metrics::Metrics;
