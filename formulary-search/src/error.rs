//! Errors that a search can produce.

use http::StatusCode;
use thiserror::Error;

/// Why a single upstream search failed.
///
/// An upstream "not found" is not an error; it is reported as an empty
/// payload, [`Envelope::empty_payload`](crate::Envelope::empty_payload).
#[derive(Debug, Error)]
pub enum SearchError {
    /// The upstream answered with an error status other than 404.
    #[error("upstream responded with {status}: {message}")]
    Upstream {
        /// The status code the upstream returned.
        status: StatusCode,
        /// A human readable description of the failure.
        message: String,
    },

    /// The upstream could not be reached, took too long, or sent something
    /// that could not be read.
    #[error("internal error while searching")]
    Internal(#[source] anyhow::Error),
}

impl SearchError {
    /// A short name for the kind of error, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Upstream { .. } => "upstream",
            SearchError::Internal(_) => "internal",
        }
    }
}
