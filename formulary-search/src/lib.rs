#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! Search backends for [Formulary](../formulary/index.html).
//!
//! A [`FieldSearcher`] runs one [`FieldQuery`], a condition on a single field
//! of one upstream [`Resource`], and returns the upstream's JSON payload. The
//! [`Executor`] does this over HTTP against the upstream API. The
//! [`Aggregator`] builds on any searcher to search every field of a resource
//! at once, merging the results into an [`Envelope`].

mod aggregate;
pub mod endpoints;
mod envelope;
mod error;
mod executor;
mod query;
mod resource;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::aggregate::{merge, Aggregator};
pub use crate::envelope::{records_of, Envelope, Meta, Record, ResultsMeta};
pub use crate::error::SearchError;
pub use crate::executor::Executor;
pub use crate::query::{escape_term, Clause, FieldQuery, UPSTREAM_MAX_LIMIT};
pub use crate::resource::{NaturalKey, Resource, UnknownResource};

/// A backend that can run single-field queries.
#[async_trait]
pub trait FieldSearcher: Send + Sync {
    /// An operator-visible name for this searcher.
    fn name(&self) -> String;

    /// Run `query`, returning the upstream payload as it was received.
    ///
    /// An upstream "not found" is returned as [`Envelope::empty_payload`],
    /// not an error.
    async fn search(&self, query: FieldQuery) -> Result<Value, SearchError>;
}
