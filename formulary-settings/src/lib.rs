#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! # Formulary Settings
//!
//! Configuration is specified in several ways, with later methods overriding earlier ones.
//!
//! 1. A base configuration checked into the repository, in `config/base.yaml`.
//!    This provides the default values for most settings.
//! 2. Per-environment configuration files in the `config` directory. The
//!    environment is selected using the environment variable `FORMULARY_ENV`.
//!    The settings for that environment are then loaded from
//!    `config/${env}.yaml`, if it exists. The default environment is
//!    "development". A "production" environment is also provided.
//! 3. A local configuration file not checked into the repository, at
//!    `config/local.yaml`. This file is in `.gitignore` and is safe to use for
//!    local configuration and secrets if desired.
//! 4. Environment variables that begin with `FORMULARY_` and have a separator
//!    for `__`. For example, `Settings::http::workers` can be controlled from
//!    the environment variable `FORMULARY_HTTP__WORKERS`.
//!
//! Tests should use `Settings::load_for_tests` which only reads from
//! `config/base.yaml`, `config/test.yaml`, and `config/local_test.yaml` (if it
//! exists). It does not read from environment variables.
//!
//! Configuration files are canonically YAML files. However, any format supported
//! by the [config] crate can be used, including JSON and TOML. To choose another
//! format, simply use a different extension for your file, like
//! `config/local.toml`.

mod logging;

pub use logging::{DirectiveWrapper, LogFormat, LoggingSettings};

use config::{Config, ConfigError, Environment, File};
use http::Uri;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, DurationSeconds};
use std::{net::SocketAddr, time::Duration};

/// Top level settings object for Formulary.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[doc(inline)]
pub struct Settings {
    /// The environment Formulary is running in. Should only be set with the
    /// `FORMULARY_ENV` environment variable.
    pub env: String,

    /// Enable additional features to debug the application. This should not be
    /// set to true in production environments.
    pub debug: bool,

    /// URL to redirect to from the root of the service. If `None`, a short
    /// plain text description is served instead.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub public_documentation: Option<Uri>,

    /// Log the search terms of incoming requests. Terms are user input, so
    /// this is off outside of development.
    pub log_full_request: bool,

    /// Settings for the HTTP server.
    pub http: HttpSettings,

    /// Settings for the upstream drug information API.
    pub upstream: UpstreamSettings,

    /// Limits applied to searches.
    pub search: SearchSettings,

    /// Logging settings.
    pub logging: LoggingSettings,

    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Settings for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpSettings {
    /// The host and port to listen on, such as "127.0.0.1:8080" or "0.0.0.0:80".
    pub listen: SocketAddr,

    /// The number of workers to use. Optional. If no value is provided, the
    /// number of logical cores will be used.
    pub workers: Option<usize>,
}

/// Settings for the connection to the upstream API.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Scheme and host of the upstream, such as `https://api.fda.gov`. Resource
    /// paths are appended to it.
    pub base_url: String,

    /// The maximum time a single upstream call may take, including reading
    /// the body.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "timeout_sec")]
    pub timeout: Duration,

    /// The maximum time to wait while establishing a connection.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "connect_timeout_sec")]
    pub connect_timeout: Duration,

    /// User-Agent sent with every upstream request.
    pub user_agent: String,

    /// Quote search terms that contain query syntax before sending them
    /// upstream. When false, terms are interpolated verbatim.
    pub escape_terms: bool,
}

/// Limits used by the search endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    /// How many records to request from each field during a search across all
    /// fields.
    pub per_field_limit: u32,

    /// How many merged records to return from a search across all fields when
    /// the caller does not specify a limit.
    pub aggregate_default_limit: usize,

    /// How many records to request from a single field search when the caller
    /// does not specify a limit.
    pub field_default_limit: u32,
}

/// Settings for the statsd metrics sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// The host to send metrics to.
    pub sink_host: String,

    /// The port to send metrics to.
    pub sink_port: u16,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// # Errors
    /// If any of the configured values are invalid, or if any of the required
    /// configuration files are missing.
    pub fn load() -> Result<Self, ConfigError> {
        let formulary_env =
            std::env::var("FORMULARY_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            // Start off with the base config.
            .add_source(File::with_name("./config/base"))
            // Merge in an environment specific config.
            .set_override("env", formulary_env.as_str())?
            .add_source(File::with_name(&format!("config/{}", formulary_env)).required(false))
            // Add a local configuration file that is `.gitignore`ed.
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables that start with "FORMULARY_" and have
            // "__" to separate levels. For example, `FORMULARY_HTTP__LISTEN`
            // maps to `Settings::http::listen`.
            .add_source(
                Environment::with_prefix("FORMULARY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Load settings from configuration files for tests.
    ///
    /// # Panics
    /// If the test configuration files are missing or invalid.
    pub fn load_for_tests() -> Self {
        Config::builder()
            // Start off with the base config.
            .add_source(File::with_name("../config/base"))
            // Merge in test specific config.
            .set_override("env", "test")
            .expect("Could not set env for tests")
            .add_source(File::with_name("../config/test"))
            // Add a local configuration file that is `.gitignore`ed.
            .add_source(File::with_name("../config/local_test").required(false))
            .build()
            .expect("Could not load settings for tests")
            .try_deserialize()
            .expect("Could not convert settings")
    }
}
