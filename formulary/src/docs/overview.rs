//! # High level overview of Formulary
//!
//! Formulary sits in front of the openFDA drug APIs. Callers search one of
//! three collections (`drugsfda`, `ndc` and `label`) either by a single field
//! or across every interesting field at once. Single-field searches are passed
//! through to the upstream nearly untouched. Searches across all fields are
//! fanned out concurrently, one upstream request per field, and the results
//! merged into a single de-duplicated list.
//!
//! This project is structured as a [Cargo Workspace][] that contains one crate
//! for each broad area of behavior.
//!
//! [Cargo Workspace]: https://doc.rust-lang.org/book/ch14-03-cargo-workspaces.html
//!
//! ## [`formulary`](../)
//!
//! The main application, and the only *binary* crate in the repository. It
//! loads settings, sets up logging and metrics, and starts the web server.
//!
//! ## [`formulary-settings`](../../formulary_settings/index.html)
//!
//! This defines and documents the settings of the application. These settings
//! are initialized by the binary crate, and passed into the other crates to
//! configure them.
//!
//! ## [`formulary-search`](../../formulary_search/index.html)
//!
//! The *domain* crate. It knows the upstream collections, the fields that are
//! searched for each of them, how to build upstream search expressions, and how
//! to merge the results of several searches. The [`FieldSearcher`] trait is the
//! seam between the search logic and the HTTP client that talks to the
//! upstream.
//!
//! [`FieldSearcher`]: ../../formulary_search/trait.FieldSearcher.html
//!
//! ## [`formulary-web`](../../formulary_web/index.html)
//!
//! This crate provides the HTTP API, including observability into the running
//! of the application via [Dockerflow] endpoints, request logging and request
//! metrics.
//!
//! [Dockerflow]: https://github.com/mozilla-services/Dockerflow
//!
//! ## [`formulary-integration-tests`](../../formulary_integration_tests/index.html)
//!
//! Tests that run the whole application against a mock upstream, and only
//! inspect it through its public HTTP API, its logs and its metrics.
