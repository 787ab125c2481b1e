//! Any errors that formulary-web might generate, and supporting implementations.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use backtrace::Backtrace;
use formulary_search::{endpoints::MissingParameter, SearchError};
use serde_json::Value;
use thiserror::Error;

/// The Standard Error for most of Formulary
pub struct HandlerError {
    /// The wrapped error value.
    kind: HandlerErrorKind,
    /// The backtrace related to the wrapped error.
    pub(crate) backtrace: Backtrace,
}

/// An error that happened in a web handler.
#[derive(Error, Debug)]
pub enum HandlerErrorKind {
    /// A generic error, when there is nothing more specific to say.
    #[error("Internal error")]
    Internal,

    /// The upstream API rejected a search. Its status is passed on to the
    /// caller.
    #[error("{message}")]
    Upstream {
        /// The status the upstream responded with.
        status: StatusCode,
        /// The upstream's description of the problem.
        message: String,
    },

    /// The requested resource or endpoint does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required query parameter was not supplied.
    #[error(transparent)]
    MissingParameter(#[from] MissingParameter),

    /// A query parameter could not be understood.
    #[error("Invalid value for query parameter `{name}`: {value:?}")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The value that was supplied.
        value: String,
    },
}

impl HandlerErrorKind {
    /// Convert the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingParameter(_) | Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SearchError> for HandlerErrorKind {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Upstream { status, message } => Self::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            },
            SearchError::Internal(_) => Self::Internal,
        }
    }
}

impl From<HandlerErrorKind> for actix_web::Error {
    fn from(kind: HandlerErrorKind) -> Self {
        let error: HandlerError = kind.into();
        error.into()
    }
}

impl HandlerError {
    /// Access the wrapped error.
    pub fn kind(&self) -> &HandlerErrorKind {
        &self.kind
    }

    /// Get an `HandlerError` representing an `Internal` error.
    pub fn internal() -> Self {
        HandlerErrorKind::Internal.into()
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.kind.source()
    }
}

impl<T> From<T> for HandlerError
where
    HandlerErrorKind: From<T>,
{
    fn from(item: T) -> Self {
        HandlerError {
            kind: HandlerErrorKind::from(item),
            backtrace: Backtrace::new(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::fmt::Debug for HandlerError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Format the name of this debug struct as `HandlerError/<error name>`
        // so different kinds of errors are told apart by log aggregation.
        fmt.debug_struct(&format!("HandlerError/{:?}", &self.kind))
            .field("kind", &self.kind)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HashMap::new();
        response.insert(
            "detail".to_owned(),
            Value::String(format!("{}", self.kind())),
        );
        HttpResponse::build(self.status_code()).json(response)
    }
}
