//! # Testing strategies
//!
//! Unit tests live next to the code they test, in `#[cfg(test)]` modules.
//! Anything that talks to the upstream is tested against an [httpmock] server,
//! so no test needs network access.
//!
//! [httpmock]: https://docs.rs/httpmock
//!
//! Integration tests live in the `formulary-integration-tests` crate. It
//! produces a single test binary. Each test is wrapped in
//! [`formulary_test`](../../formulary_integration_tests/fn.formulary_test.html),
//! which starts the server on an OS assigned port, points it at a fresh mock
//! upstream, and hands the test a client, the mock and a metrics watcher.
//!
//! Tests read settings from `config/base.yaml` and `config/test.yaml`, plus
//! `config/local_test.yaml` if it exists. Environment variables are not read.
//!
//! Run everything with
//!
//! ```shell
//! $ cargo test --workspace
//! ```
